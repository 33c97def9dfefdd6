//! Builders for the account and session operation envelopes.
//!
//! Authentication itself lives with the external auth service; these only
//! shape the envelopes a deployment sends to it.

use shoal_protocol::{Envelope, codes, keys};

pub fn register(email: &str, password: &str) -> Envelope {
    Envelope::new(codes::OPERATION_REGISTER)
        .with(keys::EMAIL, email)
        .with(keys::PASSWORD, password)
}

pub fn login(email: &str, password: &str) -> Envelope {
    Envelope::new(codes::OPERATION_LOGIN)
        .with(keys::EMAIL, email)
        .with(keys::PASSWORD, password)
}

pub fn logout(user_id: &str) -> Envelope {
    Envelope::new(codes::OPERATION_LOGOUT).with(keys::USER_ID, user_id)
}

pub fn reset_password(email: &str) -> Envelope {
    Envelope::new(codes::OPERATION_RESET_PASSWORD).with(keys::EMAIL, email)
}

pub fn join_channel(user_id: &str, channel_id: &str) -> Envelope {
    Envelope::new(codes::OPERATION_JOIN_CHANNEL)
        .with(keys::USER_ID, user_id)
        .with(keys::CHANNEL_ID, channel_id)
}

pub fn leave_channel(user_id: &str, channel_id: &str) -> Envelope {
    Envelope::new(codes::OPERATION_LEAVE_CHANNEL)
        .with(keys::USER_ID, user_id)
        .with(keys::CHANNEL_ID, channel_id)
}

pub fn create_channel(user_id: &str, channel_id: &str) -> Envelope {
    Envelope::new(codes::OPERATION_CREATE_CHANNEL)
        .with(keys::USER_ID, user_id)
        .with(keys::CHANNEL_ID, channel_id)
}

pub fn fetch_offline_messages(user_id: &str) -> Envelope {
    Envelope::new(codes::OPERATION_FETCH_OFFLINE_MESSAGES).with(keys::USER_ID, user_id)
}

pub fn fetch_channel_list(user_id: &str) -> Envelope {
    Envelope::new(codes::OPERATION_FETCH_USER_CHANNEL_LIST).with(keys::USER_ID, user_id)
}

pub fn confirm_auth_token(user_id: &str, token: &str) -> Envelope {
    Envelope::new(codes::OPERATION_CONFIRM_AUTH_TOKEN)
        .with(keys::USER_ID, user_id)
        .with(keys::TOKEN, token)
}

/// Service-side handshake: re-advertise identity and the channels served.
/// Issued on every connect, which is what makes reconnects transparent to
/// the upstream relay.
pub fn service_reconnect(service_id: &str, channel_ids: Vec<String>) -> Envelope {
    Envelope::new(codes::OPERATION_SERVICE_RECONNECT)
        .with(keys::USER_ID, service_id)
        .with(keys::CHANNEL_IDS, channel_ids)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn login_carries_credentials() {
        let env = login("a@b.c", "hunter2");
        assert_eq!(env.code, codes::OPERATION_LOGIN);
        assert_eq!(env.str_field(keys::EMAIL).unwrap(), "a@b.c");
        assert_eq!(env.str_field(keys::PASSWORD).unwrap(), "hunter2");
    }

    #[test]
    fn register_carries_credentials() {
        let env = register("a@b.c", "hunter2");
        assert_eq!(env.code, codes::OPERATION_REGISTER);
        assert_eq!(env.str_field(keys::EMAIL).unwrap(), "a@b.c");
        assert_eq!(env.str_field(keys::PASSWORD).unwrap(), "hunter2");
    }

    #[test]
    fn reset_password_names_the_account() {
        let env = reset_password("a@b.c");
        assert_eq!(env.code, codes::OPERATION_RESET_PASSWORD);
        assert_eq!(env.str_field(keys::EMAIL).unwrap(), "a@b.c");
    }

    #[test]
    fn channel_list_fetch_names_the_user() {
        let env = fetch_channel_list("U1");
        assert_eq!(env.code, codes::OPERATION_FETCH_USER_CHANNEL_LIST);
        assert_eq!(env.str_field(keys::USER_ID).unwrap(), "U1");
    }

    #[test]
    fn auth_token_confirmation_pairs_user_and_token() {
        let env = confirm_auth_token("U1", "tok-9");
        assert_eq!(env.code, codes::OPERATION_CONFIRM_AUTH_TOKEN);
        assert_eq!(env.str_field(keys::USER_ID).unwrap(), "U1");
        assert_eq!(env.str_field(keys::TOKEN).unwrap(), "tok-9");
    }

    #[test]
    fn service_reconnect_lists_served_channels() {
        let env = service_reconnect("svc-1", vec!["C1".into(), "C2".into()]);
        assert_eq!(env.code, codes::OPERATION_SERVICE_RECONNECT);
        assert_eq!(env.str_list_field(keys::CHANNEL_IDS).unwrap(), ["C1", "C2"]);
    }
}

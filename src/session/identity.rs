use rand::{distributions::Alphanumeric, Rng};

/// Length of a session token. 16 symbols from a 62-symbol alphabet gives
/// roughly 95 bits of entropy.
pub const SESSION_ID_LEN: usize = 16;

/// Generates the per-activation session token used to tag every write.
pub fn generate_session_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_ID_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn tokens_are_sixteen_alphanumerics() {
        let token = generate_session_id();
        assert_eq!(token.len(), SESSION_ID_LEN);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn tokens_do_not_collide_in_practice() {
        let tokens: HashSet<String> = (0..1_000).map(|_| generate_session_id()).collect();
        assert_eq!(tokens.len(), 1_000);
    }
}

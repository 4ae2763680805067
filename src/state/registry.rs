use std::collections::HashMap;

use rand::Rng;

use crate::{
    error::ServiceError,
    state::{
        lobby::{ConnectionId, Lobby, Player},
        question::Difficulty,
    },
};

/// Characters lobby codes are drawn from; 0/O/1/I/L are left out to avoid transcription errors.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
/// Number of characters in a lobby code.
pub const CODE_LENGTH: usize = 5;

/// Normalise a client-supplied code for lookup.
pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

/// In-memory collection of active lobbies keyed by their uppercase code.
#[derive(Debug, Default)]
pub struct LobbyRegistry {
    lobbies: HashMap<String, Lobby>,
}

impl LobbyRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of active lobbies.
    pub fn len(&self) -> usize {
        self.lobbies.len()
    }

    /// Whether no lobby is active.
    pub fn is_empty(&self) -> bool {
        self.lobbies.is_empty()
    }

    /// Register a new lobby hosted by `host_id` under a freshly allocated code.
    pub fn create_lobby<R: Rng>(
        &mut self,
        rng: &mut R,
        host_id: ConnectionId,
        host_name: String,
        difficulty: Difficulty,
    ) -> &mut Lobby {
        let code = self.allocate_code(rng);
        let lobby = Lobby::new(code.clone(), Player::new(host_id, host_name), difficulty);
        self.lobbies.entry(code).or_insert(lobby)
    }

    /// Find a lobby by code, ignoring case and surrounding whitespace.
    pub fn lookup(&self, code: &str) -> Result<&Lobby, ServiceError> {
        let code = normalize_code(code);
        self.lobbies
            .get(&code)
            .ok_or_else(|| ServiceError::NotFound(format!("lobby `{code}` not found")))
    }

    /// Mutable variant of [`LobbyRegistry::lookup`].
    pub fn lookup_mut(&mut self, code: &str) -> Result<&mut Lobby, ServiceError> {
        let code = normalize_code(code);
        self.lobbies
            .get_mut(&code)
            .ok_or_else(|| ServiceError::NotFound(format!("lobby `{code}` not found")))
    }

    /// Delete a lobby; called once its last player has left.
    pub fn remove(&mut self, code: &str) -> Option<Lobby> {
        self.lobbies.remove(&normalize_code(code))
    }

    /// Codes of every lobby `id` belongs to.
    pub fn lobbies_with(&self, id: ConnectionId) -> Vec<String> {
        self.lobbies
            .values()
            .filter(|lobby| lobby.is_member(id))
            .map(|lobby| lobby.code().to_string())
            .collect()
    }

    fn allocate_code<R: Rng>(&self, rng: &mut R) -> String {
        loop {
            let code: String = (0..CODE_LENGTH)
                .map(|_| char::from(CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())]))
                .collect();
            if !self.lobbies.contains_key(&code) {
                return code;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::{SeedableRng, rngs::StdRng};
    use uuid::Uuid;

    use super::*;

    #[test]
    fn codes_are_unique_and_well_formed() {
        let mut registry = LobbyRegistry::new();
        let mut rng = StdRng::seed_from_u64(11);
        let mut codes = HashSet::new();

        for _ in 0..2_000 {
            let code = registry
                .create_lobby(&mut rng, Uuid::new_v4(), "host".into(), Difficulty::Easy)
                .code()
                .to_string();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.bytes().all(|byte| CODE_ALPHABET.contains(&byte)));
            assert!(codes.insert(code));
        }
        assert_eq!(registry.len(), 2_000);
    }

    #[test]
    fn alphabet_excludes_ambiguous_characters() {
        for ambiguous in b"0O1IL" {
            assert!(!CODE_ALPHABET.contains(ambiguous));
        }
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let mut registry = LobbyRegistry::new();
        let mut rng = StdRng::seed_from_u64(3);
        let host = Uuid::new_v4();
        let code = registry
            .create_lobby(&mut rng, host, "host".into(), Difficulty::Hard)
            .code()
            .to_string();

        let lobby = registry
            .lookup(&format!(" {} ", code.to_lowercase()))
            .unwrap();
        assert_eq!(lobby.code(), code);
        assert_eq!(lobby.host_id(), Some(host));
        assert_eq!(lobby.round(), 0);
        assert_eq!(lobby.difficulty(), Difficulty::Hard);
        assert_eq!(lobby.player(host).unwrap().score, 0);
    }

    #[test]
    fn unknown_and_removed_codes_are_not_found() {
        let mut registry = LobbyRegistry::new();
        assert!(matches!(
            registry.lookup("zzzzz"),
            Err(ServiceError::NotFound(message)) if message.contains("ZZZZZ")
        ));

        let mut rng = StdRng::seed_from_u64(5);
        let code = registry
            .create_lobby(&mut rng, Uuid::new_v4(), "host".into(), Difficulty::Easy)
            .code()
            .to_string();
        assert!(registry.remove(&code).is_some());
        assert!(registry.lookup_mut(&code).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn lobbies_with_lists_memberships() {
        let mut registry = LobbyRegistry::new();
        let mut rng = StdRng::seed_from_u64(8);
        let player = Uuid::new_v4();

        let first = registry
            .create_lobby(&mut rng, player, "p".into(), Difficulty::Easy)
            .code()
            .to_string();
        let second = {
            let lobby =
                registry.create_lobby(&mut rng, Uuid::new_v4(), "h".into(), Difficulty::Easy);
            lobby.add_player(player, "p".into());
            lobby.code().to_string()
        };
        registry.create_lobby(&mut rng, Uuid::new_v4(), "other".into(), Difficulty::Easy);

        let mut codes = registry.lobbies_with(player);
        codes.sort();
        let mut expected = vec![first, second];
        expected.sort();
        assert_eq!(codes, expected);
    }
}

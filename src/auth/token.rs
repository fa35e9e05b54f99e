//! In-memory access token store.

use serde::Deserialize;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Body returned by the login and refresh endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
}

/// Current token together with the generation it was written at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSnapshot {
    pub token: Option<String>,
    pub generation: u64,
}

#[derive(Debug, Default)]
struct TokenState {
    token: Option<String>,
    generation: u64,
}

/// Single source of truth for the access token.
///
/// Every write bumps a generation counter so that a refresh started before a
/// logout (or a fresh login) can detect that its result is stale.
#[derive(Debug, Default)]
pub struct TokenStore {
    state: Mutex<TokenState>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, TokenState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self) -> Option<String> {
        self.lock().token.clone()
    }

    pub fn snapshot(&self) -> TokenSnapshot {
        let state = self.lock();
        TokenSnapshot {
            token: state.token.clone(),
            generation: state.generation,
        }
    }

    /// Replaces the token unconditionally. Returns the new generation.
    pub fn set(&self, token: Option<String>) -> u64 {
        let mut state = self.lock();
        state.token = token;
        state.generation += 1;
        state.generation
    }

    /// Replaces the token only if no write happened since `expected`.
    ///
    /// On conflict the current snapshot is returned and nothing changes.
    pub fn set_if_generation(
        &self,
        expected: u64,
        token: Option<String>,
    ) -> Result<u64, TokenSnapshot> {
        let mut state = self.lock();
        if state.generation != expected {
            return Err(TokenSnapshot {
                token: state.token.clone(),
                generation: state.generation,
            });
        }
        state.token = token;
        state.generation += 1;
        Ok(state.generation)
    }
}

/// Masks a token for logging, keeping a short prefix and suffix.
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 12 {
        return "*********".to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}*********{}", head, tail)
}

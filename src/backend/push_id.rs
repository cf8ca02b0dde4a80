//! # Push Identifiers
//!
//! 20-character child keys for `push`: 8 characters of millisecond timestamp
//! followed by 12 random characters, all over a 64-symbol alphabet whose
//! ASCII order matches its numeric order. Keys therefore sort by creation
//! time, and keys minted within the same millisecond stay ordered because
//! the random tail is incremented instead of redrawn.

use std::sync::Mutex;

use rand::Rng;

/// Alphabet in ascending ASCII order; index == numeric value
const ALPHABET: &[u8; 64] =
    b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";

const TIMESTAMP_CHARS: usize = 8;
const RANDOM_CHARS: usize = 12;

#[derive(Debug, Default)]
struct PushState {
    last_millis: i64,
    last_rand: [u8; RANDOM_CHARS],
}

/// Generator of time-ordered push keys
#[derive(Debug, Default)]
pub struct PushIdGenerator {
    state: Mutex<PushState>,
}

impl PushIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint the next key
    pub fn next_id(&self) -> String {
        self.next_id_at(chrono::Utc::now().timestamp_millis())
    }

    fn next_id_at(&self, now: i64) -> String {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };

        if now == state.last_millis {
            // Same millisecond: bump the tail so ordering holds.
            increment(&mut state.last_rand);
        } else {
            state.last_millis = now;
            let mut rng = rand::thread_rng();
            for slot in state.last_rand.iter_mut() {
                *slot = rng.gen_range(0..64);
            }
        }

        let mut id = String::with_capacity(TIMESTAMP_CHARS + RANDOM_CHARS);
        let mut millis = now;
        let mut stamp = [0u8; TIMESTAMP_CHARS];
        for slot in stamp.iter_mut().rev() {
            *slot = (millis % 64) as u8;
            millis /= 64;
        }
        for index in stamp {
            id.push(ALPHABET[index as usize] as char);
        }
        for index in state.last_rand {
            id.push(ALPHABET[index as usize] as char);
        }
        id
    }
}

fn increment(tail: &mut [u8; RANDOM_CHARS]) {
    for slot in tail.iter_mut().rev() {
        if *slot < 63 {
            *slot += 1;
            return;
        }
        *slot = 0;
    }
}

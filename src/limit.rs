//! Object name length limiting.
//!
//! Object stores cap the length of a key's final segment. Names longer than
//! [`MAX_OBJECT_NAME_LENGTH`] keep their tail and gain a short random token
//! so that two long names sharing a tail do not collide. The shortened name
//! cannot be mapped back to the original; callers must use the returned path.

use rand::distributions::Alphanumeric;
use rand::Rng;

/// Maximum length (in characters) of the final path segment.
pub const MAX_OBJECT_NAME_LENGTH: usize = 255;

/// Length of the random disambiguation token.
const TOKEN_LENGTH: usize = 5;

/// Shorten the final segment of `path` if needed, using the thread RNG.
pub fn limit(path: &str) -> String {
    limit_with(path, &mut rand::thread_rng())
}

/// Shorten the final segment of `path` if needed, drawing the token from `rng`.
pub fn limit_with<R: Rng + ?Sized>(path: &str, rng: &mut R) -> String {
    let (dir, name) = match path.rfind('/') {
        Some(idx) => path.split_at(idx + 1),
        None => ("", path),
    };

    let name_len = name.chars().count();
    if name_len <= MAX_OBJECT_NAME_LENGTH {
        return path.to_string();
    }

    // token + '-' + tail must fit in the limit
    let keep = MAX_OBJECT_NAME_LENGTH - TOKEN_LENGTH - 1;
    let tail: String = name.chars().skip(name_len - keep).collect();
    let token: String = (0..TOKEN_LENGTH)
        .map(|_| char::from(rng.sample(Alphanumeric)).to_ascii_lowercase())
        .collect();

    format!("{dir}{token}-{tail}")
}

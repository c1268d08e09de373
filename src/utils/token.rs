use rand::{distributions::Alphanumeric, thread_rng, Rng};

const MEETING_TOKEN_LEN: usize = 16;

pub fn generate_room_token(length: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect::<String>()
        .to_ascii_lowercase()
}

/// `{base}/{token}` for a fresh video room.
pub fn meeting_link(base_url: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        generate_room_token(MEETING_TOKEN_LEN)
    )
}

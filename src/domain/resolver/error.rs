#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("audio fetch failed after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}

use rand::distributions::Alphanumeric;
use rand::Rng;

/// Produces ids for records created without one.
pub trait IdGenerator: Send + Sync {
    fn generate(&self, model: &str) -> String;
}

impl<F> IdGenerator for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn generate(&self, model: &str) -> String {
        self(model)
    }
}

/// Random alphanumeric ids, 32 characters unless configured otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RandomId {
    len: usize,
}

impl RandomId {
    pub const DEFAULT_LEN: usize = 32;

    pub fn new(len: usize) -> Self {
        Self { len }
    }
}

impl Default for RandomId {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LEN)
    }
}

impl IdGenerator for RandomId {
    fn generate(&self, _model: &str) -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(self.len)
            .map(char::from)
            .collect()
    }
}

use uuid::Uuid;

/// Source of identifiers for surveys, scenarios and responses.
pub trait IdGenerator {
    fn next_id(&mut self) -> String;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&mut self) -> String {
        Uuid::new_v4().to_string()
    }
}

#[cfg(test)]
pub struct SequentialIds {
    prefix: &'static str,
    next: usize,
}

#[cfg(test)]
impl SequentialIds {
    pub fn new(prefix: &'static str) -> Self {
        Self { prefix, next: 0 }
    }
}

#[cfg(test)]
impl IdGenerator for SequentialIds {
    fn next_id(&mut self) -> String {
        self.next += 1;
        format!("{}-{}", self.prefix, self.next)
    }
}

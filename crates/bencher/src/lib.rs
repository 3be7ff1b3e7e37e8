#[derive(Debug, Copy, Clone)]
pub struct TestCase {
    name: &'static str,
    group: TestGroup,
    payload: Payload,
}

impl TestCase {
    pub fn new(name: &'static str, group: TestGroup, payload: Payload) -> Self {
        Self { name, group, payload }
    }

    pub fn small(name: &'static str, payload: Payload) -> Self {
        Self::new(name, TestGroup::Small, payload)
    }

    pub fn large(name: &'static str, payload: Payload) -> Self {
        Self::new(name, TestGroup::Large, payload)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn group(&self) -> TestGroup {
        self.group
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }
}

/// Bytes pushed through the buffer by a benchmark, written in `chunk_size`
/// pieces the way socket reads would deliver them.
#[derive(Debug, Copy, Clone)]
pub struct Payload {
    content: &'static [u8],
    chunk_size: usize,
}

impl Payload {
    pub const fn new(content: &'static [u8], chunk_size: usize) -> Self {
        Self { content, chunk_size }
    }

    pub fn content(&self) -> &'static [u8] {
        self.content
    }

    pub fn chunks(&self) -> impl Iterator<Item = &'static [u8]> {
        self.content.chunks(self.chunk_size)
    }
}

#[derive(Clone, Copy, Debug)]
pub enum TestGroup {
    Small,
    Large,
}

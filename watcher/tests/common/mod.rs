#![allow(dead_code)]

pub mod fakes;
pub mod http_stub;

pub use fakes::{FakeStatusProvider, RecordingNotifier, test_config};
pub use http_stub::{HttpStub, StubResponse};

/// Process exit codes surfaced by the CLI.
///
/// `Success`, `Blocked` and `ValidationError` are part of the run contract;
/// the remaining codes classify failures that happen outside a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ErrorCode {
    Success = 0,
    Blocked = 1,
    ValidationError = 2,
    ConfigError = 11,
    IoError = 20,
    InternalError = 50,
}

impl ErrorCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// Lockout state reported back to login flows.
///
/// Returned by both failed-attempt recording and status checks. For an
/// unknown user id the engine reports "not locked, full attempts remaining"
/// so callers cannot probe which accounts exist.
#[derive(Debug, Clone, PartialEq)]
pub struct LockoutStatus {
    pub is_locked: bool,
    /// Attempts left before the account locks; 0 when locked.
    pub remaining_attempts: i32,
    pub locked_until: Option<i64>,
}

impl LockoutStatus {
    /// Status for an account with no failures on record (also the
    /// anti-enumeration answer for unknown users).
    pub fn clear(max_attempts: i32) -> Self {
        Self {
            is_locked: false,
            remaining_attempts: max_attempts,
            locked_until: None,
        }
    }
}

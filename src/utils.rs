use chrono::NaiveDateTime;
use uuid::Uuid;

/// Injected wall-clock seam. Production uses [`SystemClock`]; tests pin
/// "now" with [`FixedClock`].
pub trait Clock: Send {
    fn now(&self) -> NaiveDateTime;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

/// Referral codes are the alphanumeric local part of the email plus a
/// short random suffix. Uniqueness against the ledger is enforced by the
/// caller.
pub fn referral_code(email: &str) -> String {
    let local: String = email
        .split('@')
        .next()
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect();
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}{}", local.to_lowercase(), &suffix[..4])
}

pub fn withdrawal_id() -> String {
    format!("wr_{}", Uuid::new_v4().simple())
}

/// Return this error from a user's behaviour to indicate that the simulated user is giving up.
///
/// The user stops where it is and records its end event. The rest of the run carries on, so this
/// is the right choice for errors that only affect one user, like a rejected login.
#[derive(derive_more::Error, derive_more::Display, Debug)]
pub struct UserBailError {
    msg: String,
}

impl UserBailError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

impl Default for UserBailError {
    fn default() -> Self {
        Self {
            msg: "User is bailing".to_string(),
        }
    }
}

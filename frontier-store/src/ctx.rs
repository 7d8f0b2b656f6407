/// Request context: who is acting. Auth itself lives outside the kernel;
/// handlers resolve a session to a username and hand it down from there.
#[derive(Debug, Clone)]
pub struct Ctx {
    username: Option<String>,
}

impl Ctx {
    pub fn anonymous() -> Self {
        Ctx { username: None }
    }

    pub fn for_user(username: impl Into<String>) -> Self {
        Ctx {
            username: Some(username.into()),
        }
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }
}

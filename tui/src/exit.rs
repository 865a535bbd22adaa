use chatline_protocol::ThreadId;

/// Summary information produced when a chatline session exits.
#[derive(Debug, Clone)]
pub struct AppExitInfo {
    /// The thread that was open, if any.
    pub thread_id: Option<ThreadId>,
    /// Messages submitted from the composer during the session.
    pub messages_sent: usize,
    /// Why the session ended.
    pub exit_reason: ExitReason,
}

/// Reason why the chatline session terminated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// The user requested exit.
    UserRequested,
    /// The thread service went away.
    BackendClosed,
    /// A fatal error occurred and the session cannot continue.
    Fatal(String),
}

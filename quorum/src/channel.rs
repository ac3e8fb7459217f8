//! Send-side seams.
//!
//! The collector never touches a socket.  It hands its request to one
//! of two collaborator seams:
//!
//! - a [`RequestChannel`] — a correlation layer that tags the request
//!   with the session's request id, routes matching responses back to
//!   `receive_response()`, and releases its server-side state when told
//!   the id is done; or
//! - a raw [`MessageSender`] when no correlation layer is configured
//!   (fire-and-forget style deployments).

use {
    crate::error::Result,
    groupmesh_stack::{member::MemberId, message::Message},
    std::sync::Arc,
};

/// Correlated request channel: sends a request keyed by id and later
/// releases the correlation state for that id.
pub trait RequestChannel: Send + Sync {
    /// Send `request` to `targets`, tagged with `req_id`.  When
    /// `collect_responses` is false the channel must not register any
    /// response routing for this id (fire-and-forget).
    fn send_request(
        &self,
        req_id: u64,
        targets: &[MemberId],
        request: &Message,
        collect_responses: bool,
    ) -> Result<()>;

    /// Release any correlation state held for `req_id`.  Called on
    /// every exit path of `execute()`, including failure and timeout.
    fn done(&self, req_id: u64);
}

/// Raw, uncorrelated message sender.
pub trait MessageSender: Send + Sync {
    /// Send one message toward its destination.
    fn send(&self, msg: &Message) -> Result<()>;
}

/// The send seam a session was configured with.
#[derive(Clone)]
pub enum RequestSender {
    /// Correlated channel keyed by request id.
    Correlated(Arc<dyn RequestChannel>),
    /// Raw send; responses must be fed in by other means, and `done`
    /// notifications are not applicable.
    Raw(Arc<dyn MessageSender>),
}

impl RequestSender {
    /// Dispatch the request through whichever seam is configured.
    pub(crate) fn send_request(
        &self,
        req_id: u64,
        targets: &[MemberId],
        request: &Message,
        collect_responses: bool,
    ) -> Result<()> {
        match self {
            Self::Correlated(channel) => {
                channel.send_request(req_id, targets, request, collect_responses)
            }
            Self::Raw(sender) => sender.send(request),
        }
    }

    /// Tell a correlated channel the id is finished.  No-op for raw.
    pub(crate) fn done(&self, req_id: u64) {
        if let Self::Correlated(channel) = self {
            channel.done(req_id);
        }
    }
}

//! Viewer-side reconciliation of inbound issue events.
//!
//! Each viewer owns one [`Board`]: a keyed, append-or-update collection of
//! issue rows. Inbound events are merged by `iid`; rows are created on
//! first sight and never removed. Writes to a row's done control that
//! originate from inbound data run inside a [`ProgrammaticWrite`] scope,
//! so they can never re-enter the action path as a user change.

use std::collections::BTreeMap;

use crate::event::{IssueAction, IssueEvent, WebhookPayload};
use crate::relay::gitlab::GitLabIssue;

/// Where genuine user toggles are delivered. The terminal client forwards
/// them to the action bridge; tests record them.
pub trait ActionSink {
    fn close_requested(&mut self, iid: u64);
    fn reopen_requested(&mut self, iid: u64);
}

/// Two-state flag guarding the done control's change handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum WriteOrigin {
    #[default]
    Idle,
    Suppressing,
}

/// One visible issue row.
#[derive(Debug)]
pub struct Row {
    pub iid: u64,
    pub title: String,
    pub description: String,
    pub avatar_url: Option<String>,
    done: bool,
    origin: WriteOrigin,
}

impl Row {
    fn new(iid: u64) -> Self {
        Self {
            iid,
            title: String::new(),
            description: String::new(),
            avatar_url: None,
            done: false,
            origin: WriteOrigin::Idle,
        }
    }

    pub fn done(&self) -> bool {
        self.done
    }

    /// Muted presentation is derived from the closed state; the two cannot
    /// disagree.
    pub fn muted(&self) -> bool {
        self.done
    }

    /// Write the done control and run its change handler. Genuine user
    /// writes dispatch to the sink; writes under suppression do not.
    fn set_done(&mut self, value: bool, sink: &mut dyn ActionSink) {
        self.done = value;
        match self.origin {
            WriteOrigin::Suppressing => {}
            WriteOrigin::Idle => {
                if value {
                    sink.close_requested(self.iid);
                } else {
                    sink.reopen_requested(self.iid);
                }
            }
        }
    }

    fn programmatic(&mut self) -> ProgrammaticWrite<'_> {
        ProgrammaticWrite::begin(self)
    }

    fn apply_text(&mut self, payload: &WebhookPayload) {
        if let Some(title) = &payload.object_attributes.title {
            self.title.clone_from(title);
        }
        if let Some(description) = &payload.object_attributes.description {
            self.description.clone_from(description);
        }
    }

    fn apply_avatar(&mut self, payload: &WebhookPayload) {
        if let Some(avatar) = payload
            .user
            .as_ref()
            .and_then(|user| user.avatar_url.clone())
        {
            self.avatar_url = Some(avatar);
        }
    }
}

/// Scoped suppression of the user-change handler: raised on entry and
/// cleared when the scope drops, covering every exit path.
struct ProgrammaticWrite<'a> {
    row: &'a mut Row,
}

impl<'a> ProgrammaticWrite<'a> {
    fn begin(row: &'a mut Row) -> Self {
        row.origin = WriteOrigin::Suppressing;
        Self { row }
    }

    fn set_done(&mut self, value: bool, sink: &mut dyn ActionSink) {
        self.row.set_done(value, sink);
    }
}

impl Drop for ProgrammaticWrite<'_> {
    fn drop(&mut self) {
        self.row.origin = WriteOrigin::Idle;
    }
}

/// The live, checkbox-editable issue collection of one viewer.
#[derive(Debug, Default)]
pub struct Board {
    rows: BTreeMap<u64, Row>,
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, iid: u64) -> Option<&Row> {
        self.rows.get(&iid)
    }

    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.rows.values()
    }

    fn row_for(&mut self, iid: u64) -> &mut Row {
        self.rows.entry(iid).or_insert_with(|| Row::new(iid))
    }

    /// Merge one inbound event. Rows are created on first sight; the field
    /// mapping depends on the event tag. State writes caused here are
    /// programmatic and never reach the sink.
    pub fn apply(&mut self, event: &IssueEvent, sink: &mut dyn ActionSink) {
        match event {
            IssueEvent::Opened(payload) => {
                let row = self.row_for(payload.object_attributes.iid);
                row.apply_text(payload);
                row.apply_avatar(payload);
                row.programmatic().set_done(false, sink);
            }
            IssueEvent::Reopened(payload) => {
                // Reopen refreshes the text but leaves the avatar alone.
                let row = self.row_for(payload.object_attributes.iid);
                row.apply_text(payload);
                row.programmatic().set_done(false, sink);
            }
            IssueEvent::Closed(payload) => {
                let row = self.row_for(payload.object_attributes.iid);
                // A close without the matching action leaves the state
                // untouched; partial payloads must not flip rows.
                if payload.object_attributes.action_kind() == IssueAction::Close {
                    row.programmatic().set_done(true, sink);
                }
            }
            IssueEvent::Updated(payload) => {
                let row = self.row_for(payload.object_attributes.iid);
                row.apply_text(payload);
                row.apply_avatar(payload);
            }
            IssueEvent::Snapshot(issues) => {
                for issue in issues {
                    self.apply_snapshot_item(issue, sink);
                }
            }
        }
    }

    fn apply_snapshot_item(&mut self, issue: &GitLabIssue, sink: &mut dyn ActionSink) {
        let row = self.row_for(issue.iid);
        row.title.clone_from(&issue.title);
        if let Some(description) = &issue.description {
            row.description.clone_from(description);
        }
        if let Some(avatar) = issue
            .author
            .as_ref()
            .and_then(|author| author.avatar_url.clone())
        {
            row.avatar_url = Some(avatar);
        }
        row.programmatic().set_done(issue.is_closed(), sink);
    }

    /// A genuine user click on a row's done control: flips the state and
    /// lets the change handler dispatch to the sink. Returns `false` for
    /// an unknown row.
    pub fn toggle(&mut self, iid: u64, sink: &mut dyn ActionSink) -> bool {
        match self.rows.get_mut(&iid) {
            Some(row) => {
                let next = !row.done;
                row.set_done(next, sink);
                true
            }
            None => false,
        }
    }
}

//! Command processing for one account's annotations.
//!
//! [`Account`] owns the store behind a readers-writer lock: GETMETADATA runs
//! under the read lock on a read transaction, SETMETADATA under the write
//! lock on a write transaction. Change batches are published after commit
//! while the write lock is still held, so subscribers observe batches in
//! commit order.

use std::collections::BTreeSet;

use log::{debug, error, trace};
use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::{
    command::{Command, CommandBody, EntryValue, GetOptions, Mailbox, Tag},
    entry::Entry,
    matcher::EntryMatcher,
    notify::{AnnotationChange, ChangeBroadcaster},
    parse::{decode_command, decode_tag, DecodeError, LiteralMode},
    quota::{MetadataLimits, QuotaError},
    response::{Code, Data, Response, Status},
    store::{Annotation, AnnotationStore, ReadTx, Scope, StoreError, WriteTx},
};

/// The metadata engine for one account.
pub struct Account<S> {
    store: RwLock<S>,
    limits: MetadataLimits,
    broadcaster: ChangeBroadcaster,
}

impl<S: AnnotationStore> Account<S> {
    pub fn new(store: S) -> Self {
        Self::with_limits(store, MetadataLimits::default())
    }

    pub fn with_limits(store: S, limits: MetadataLimits) -> Self {
        Self {
            store: RwLock::new(store),
            limits,
            broadcaster: ChangeBroadcaster::default(),
        }
    }

    /// Receive batches of changes committed by future SETMETADATA commands.
    pub fn subscribe(&self) -> broadcast::Receiver<Vec<AnnotationChange>> {
        self.broadcaster.subscribe()
    }

    /// Run store maintenance outside of command processing, e.g. mailbox
    /// provisioning in tests.
    pub fn with_store<T>(&self, f: impl FnOnce(&mut S) -> T) -> T {
        f(&mut self.store.write())
    }

    /// Execute one parsed command, producing the responses to send in order.
    ///
    /// Client-visible failures (unknown mailbox, bad entry names, exceeded
    /// limits) come back as NO/BAD responses inside `Ok`; `Err` is reserved
    /// for store failures the caller cannot report meaningfully.
    pub fn execute(&self, command: Command) -> Result<Vec<Response>, StoreError> {
        let Command { tag, body } = command;

        match body {
            CommandBody::GetMetadata {
                options,
                mailbox,
                entries,
            } => self.get_metadata(tag, options, mailbox, entries),
            CommandBody::SetMetadata {
                mailbox,
                entry_values,
            } => self.set_metadata(tag, mailbox, entry_values),
        }
    }

    /// Decode and execute commands from a raw buffer.
    ///
    /// The caller owns buffering: feed it the bytes received so far and act
    /// on the returned [`LineResult`]. Every failure is resolved here, store
    /// failures included; nothing leaks as a raw error.
    pub fn handle_line(&self, input: &[u8]) -> LineResult {
        match decode_command(input) {
            Ok((remaining, command)) => {
                let consumed = input.len() - remaining.len();
                let tag = command.tag.clone();

                let responses = match self.execute(command) {
                    Ok(responses) => responses,
                    Err(err) => {
                        error!("command {}: {err}", tag.inner());

                        vec![Response::Status(Status::no(
                            tag,
                            None,
                            "internal server error",
                        ))]
                    }
                };

                LineResult::Done {
                    consumed,
                    responses,
                }
            }
            Err(DecodeError::Incomplete) => LineResult::Incomplete,
            Err(DecodeError::LiteralFound {
                length,
                mode: LiteralMode::Sync,
            }) => LineResult::LiteralAnnounced {
                length,
                response: Response::CommandContinuationRequest {
                    text: "ready for literal data".to_owned(),
                },
            },
            // A non-synchronizing literal needs no continuation request;
            // the client keeps sending.
            Err(DecodeError::LiteralFound {
                mode: LiteralMode::NonSync,
                ..
            }) => LineResult::Incomplete,
            Err(DecodeError::Failed) => {
                // Skip the offending line so the session can resync.
                let consumed = input
                    .iter()
                    .position(|&b| b == b'\n')
                    .map_or(input.len(), |pos| pos + 1);

                LineResult::Done {
                    consumed,
                    responses: vec![Response::Status(Status::bad(
                        decode_tag(input),
                        "unable to parse command",
                    ))],
                }
            }
        }
    }

    fn get_metadata(
        &self,
        tag: Tag,
        options: GetOptions,
        mailbox: Mailbox,
        entries: BTreeSet<Entry>,
    ) -> Result<Vec<Response>, StoreError> {
        trace!(
            "getmetadata: mailbox={:?} entries={} depth={:?} maxsize={:?}",
            mailbox.as_str(),
            entries.len(),
            options.depth,
            options.max_size
        );

        let store = self.store.read();
        let tx = store.begin_read()?;

        let scope = match resolve_scope(&tx, &mailbox)? {
            Some(scope) => scope,
            None => return Ok(vec![missing_mailbox(tag)]),
        };

        let matcher = EntryMatcher::new(&entries, options.depth);

        // Size of the largest value excluded by MAXSIZE, if any.
        let mut longentries: Option<u32> = None;
        let mut entry_values = Vec::new();

        for annotation in tx.scan_scope(scope)? {
            if !matcher.matches(&annotation.key) {
                continue;
            }

            if let Some(max_size) = options.max_size {
                let len = annotation.value.len();
                if len as u64 > u64::from(max_size) {
                    let len = u32::try_from(len).unwrap_or(u32::MAX);
                    longentries = Some(longentries.map_or(len, |cur| cur.max(len)));
                    continue;
                }
            }

            entry_values.push(EntryValue {
                entry: Entry::unvalidated(annotation.key),
                value: Some(annotation.value),
            });
        }

        let mut responses = Vec::new();

        // Only send the untagged response when something matched.
        if !entry_values.is_empty() {
            responses.push(Response::Data(Data::Metadata {
                mailbox,
                entry_values,
            }));
        }

        responses.push(Response::Status(match longentries {
            Some(size) => Status::ok_with_code(
                tag,
                Code::MetadataLongEntries(size),
                "getmetadata done",
            ),
            None => Status::ok(tag, "getmetadata done"),
        }));

        Ok(responses)
    }

    fn set_metadata(
        &self,
        tag: Tag,
        mailbox: Mailbox,
        entry_values: Vec<EntryValue>,
    ) -> Result<Vec<Response>, StoreError> {
        // Entry name rules are checked up front, before any mutation.
        for entry_value in &entry_values {
            if let Err(err) = entry_value.entry.validate_private() {
                return Ok(vec![Response::Status(Status::no(
                    tag,
                    None,
                    err.to_string(),
                ))]);
            }
        }

        let mut store = self.store.write();
        let mut tx = store.begin_write()?;

        let scope = match resolve_scope(&tx, &mailbox)? {
            Some(scope) => scope,
            None => return Ok(vec![missing_mailbox(tag)]),
        };

        let mut changes = Vec::new();

        for EntryValue { entry, value } in entry_values {
            let key = entry.into_inner();

            let Some(value) = value else {
                // NIL removes the annotation; removing an absent one is a no-op.
                if tx.delete(scope, &key)? {
                    changes.push(AnnotationChange {
                        mailbox: mailbox.clone(),
                        key,
                    });
                }
                continue;
            };

            match tx.get(scope, &key)? {
                None => {
                    tx.insert(Annotation {
                        scope,
                        key: key.clone(),
                        value,
                    })?;
                    changes.push(AnnotationChange {
                        mailbox: mailbox.clone(),
                        key,
                    });
                }
                Some(old) => {
                    // The row is rewritten either way; a change is only
                    // recorded when the content actually differs.
                    let changed = old.value != value;
                    tx.update(Annotation {
                        scope,
                        key: key.clone(),
                        value,
                    })?;
                    if changed {
                        changes.push(AnnotationChange {
                            mailbox: mailbox.clone(),
                            key,
                        });
                    }
                }
            }
        }

        // Limits are checked against the whole account, with the batch
        // applied. A violation drops the transaction, undoing the batch.
        let all = tx.scan_all()?;
        if let Err(err) = self.limits.check(&all) {
            let code = match err {
                QuotaError::TooMany { .. } => Code::MetadataTooMany,
                QuotaError::TotalSize { limit } => {
                    Code::MetadataMaxSize(u32::try_from(limit).unwrap_or(u32::MAX))
                }
            };

            return Ok(vec![Response::Status(Status::no(
                tag,
                Some(code),
                err.to_string(),
            ))]);
        }

        tx.commit()?;
        debug!("setmetadata: committed, {} change(s)", changes.len());

        // Published under the write lock, so batches arrive in commit order.
        self.broadcaster.publish(changes);

        Ok(vec![Response::Status(Status::ok(tag, "setmetadata done"))])
    }
}

impl<S> std::fmt::Debug for Account<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

/// The outcome of feeding buffered bytes to [`Account::handle_line`].
#[derive(Debug)]
pub enum LineResult {
    /// A command was handled (or rejected with BAD); drop `consumed` bytes
    /// from the buffer and send the responses.
    Done {
        consumed: usize,
        responses: Vec<Response>,
    },

    /// More bytes are needed.
    Incomplete,

    /// A synchronizing literal was announced. Send the continuation request,
    /// then call again once more bytes arrived.
    LiteralAnnounced { length: u32, response: Response },
}

/// Map a mailbox name to a storage scope. `None` means the mailbox does not
/// exist; the caller answers NO [TRYCREATE].
fn resolve_scope<T: ReadTx>(tx: &T, mailbox: &Mailbox) -> Result<Option<Scope>, StoreError> {
    if mailbox.is_account() {
        return Ok(Some(Scope::Account));
    }

    Ok(tx.mailbox(mailbox.as_str())?.map(Scope::Mailbox))
}

fn missing_mailbox(tag: Tag) -> Response {
    Response::Status(Status::no(tag, Some(Code::TryCreate), "no such mailbox"))
}

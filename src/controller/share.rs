//! Share with clipboard fallback

use std::sync::Arc;

use super::{replace_task, Inner, StreamPlaybackController};
use crate::constants::SHARE_MESSAGE_DURATION;
use crate::protocol::{messages, ShareOutcome};

impl StreamPlaybackController {
    /// Hand the station link to the host share sheet. Without one, copy it
    /// to the clipboard and flash a confirmation.
    pub fn share(&self) -> ShareOutcome {
        let inner = &self.inner;
        let payload = &inner.share_payload;

        match inner.share_target.share(payload) {
            Ok(()) => {
                tracing::info!(url = %payload.url, "Shared station link");
                ShareOutcome::Shared
            }
            Err(e) => {
                tracing::debug!("Share unavailable, copying link: {}", e);
                match inner.clipboard.write_text(&payload.clipboard_text()) {
                    Ok(()) => {
                        inner.flash_message(messages::LINK_COPIED);
                        ShareOutcome::Copied
                    }
                    Err(e) => {
                        tracing::warn!("Could not copy link: {}", e);
                        ShareOutcome::Unavailable
                    }
                }
            }
        }
    }
}

impl Inner {
    /// Show `message` briefly, then put back what was there unless the
    /// session moved on in the meantime
    fn flash_message(self: &Arc<Self>, message: &'static str) {
        let (status, previous) = {
            let mut session = self.session.lock();
            let previous = std::mem::replace(&mut session.message, message.to_string());
            (session.status, previous)
        };
        self.publish();

        let weak = Arc::downgrade(self);
        let task = self.runtime.spawn(async move {
            tokio::time::sleep(SHARE_MESSAGE_DURATION).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if !inner.is_alive() {
                return;
            }
            {
                let mut session = inner.session.lock();
                if session.message != message {
                    return;
                }
                session.message = if session.status == status && previous != message {
                    previous
                } else {
                    session.resting_message()
                };
            }
            inner.publish();
        });
        replace_task(&mut self.tasks.lock().share_reset, task);
    }
}

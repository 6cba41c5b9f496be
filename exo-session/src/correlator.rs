//! Correlated response wait
//!
//! A logical call sends all of its chunk requests first and then drains the
//! channel until every correlation id has been answered by an `update`.
//! Updates for other ids, including late answers to calls that already
//! timed out, are dropped.

use crate::channel::SessionChannel;
use exo_application::Message;
use exo_application::PendingRequests;
use exo_application::pdu::UpdateParams;
use exo_core::{ExoError, ExoResult};
use exo_transport::TransportLayer;

impl<T: TransportLayer> SessionChannel<T> {
    /// Send every prepared request in order
    pub async fn send_all(&mut self, requests: &[(u32, Message)]) -> ExoResult<()> {
        for (_, message) in requests {
            self.send(message).await?;
        }
        Ok(())
    }

    /// Wait until every pending id has been answered
    ///
    /// # Errors
    ///
    /// Returns `ExoError::Timeout` when the deadline passes with ids still
    /// outstanding; answers collected so far stay in `pending` but must not
    /// be reported as a result.
    pub async fn await_updates(
        &mut self,
        pending: &mut PendingRequests<UpdateParams>,
    ) -> ExoResult<()> {
        while !pending.is_complete() {
            let Some(remaining) = pending.remaining() else {
                return Err(timed_out(pending));
            };

            let message = match self.receive(Some(remaining)).await {
                Ok(message) => message,
                Err(ExoError::Timeout(_)) => return Err(timed_out(pending)),
                Err(e) => return Err(e),
            };

            match message {
                Some(Message::Update {
                    context: Some(context),
                    params,
                }) => {
                    if !pending.accept(context, params) {
                        log::debug!("Dropping update for unmatched context {}", context);
                    }
                }
                Some(Message::Update { context: None, .. }) => {
                    log::debug!("Dropping update without context");
                }
                Some(other) => {
                    log::debug!("Ignoring {} while waiting for updates", other.method());
                }
                None => {}
            }
        }
        Ok(())
    }
}

fn timed_out(pending: &PendingRequests<UpdateParams>) -> ExoError {
    ExoError::Timeout(format!(
        "waiting for {} update(s), contexts {:?}",
        pending.outstanding(),
        pending.pending_contexts()
    ))
}

#[cfg(test)]
mod tests {
    use crate::channel::tests::{authenticated, identified};
    use exo_application::PendingRequests;
    use std::time::Duration;

    fn update(context: u32, item: u32, value: f64) -> String {
        format!(
            r#"{{"method":"update","context":{},"params":{{"devices":[{{"device":0,"items":[{}],"values":[{}],"errors":[0]}}]}}}}"#,
            context, item, value
        )
    }

    #[tokio::test]
    async fn test_collects_all_contexts() {
        let (mut channel, peer) = identified().await;
        peer.send_text(update(99, 1, 0.0)).unwrap();
        peer.send_text(update(5, 2, 2.0)).unwrap();
        peer.send_text(r#"{"method":"identity","params":{"serial":"1"}}"#).unwrap();
        peer.send_text(update(4, 1, 1.0)).unwrap();

        let mut pending = PendingRequests::new([4, 5], Duration::from_secs(1));
        channel.await_updates(&mut pending).await.unwrap();

        let results = pending.into_results();
        let contexts: Vec<u32> = results.iter().map(|(context, _)| *context).collect();
        assert_eq!(contexts, vec![5, 4]);
        assert_eq!(results[0].1.devices[0].items, vec![2]);
        assert_eq!(channel.identity().serial.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_timeout_with_outstanding_context() {
        let (mut channel, peer) = identified().await;
        peer.send_text(update(4, 1, 1.0)).unwrap();

        let mut pending = PendingRequests::new([4, 5], Duration::from_millis(50));
        let err = channel.await_updates(&mut pending).await.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(pending.pending_contexts(), &[5]);
    }

    #[tokio::test]
    async fn test_encrypted_updates() {
        let (mut channel, peer, mut peer_cipher) = authenticated().await;
        peer.send_binary(peer_cipher.encrypt(&update(200_100, 7, 3.5)).unwrap())
            .unwrap();

        let mut pending = PendingRequests::new([200_100], Duration::from_secs(1));
        channel.await_updates(&mut pending).await.unwrap();
        assert!(pending.is_complete());
    }
}

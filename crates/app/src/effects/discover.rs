//! Discover effect — MAC discovery from DHCP DISCOVER broadcasts.
//!
//! Phones and such broadcast a DHCP DISCOVER when they join the network.
//! One UDP listener on the DHCP server port sniffs those frames and reports
//! the client MAC to every declared tagger. All discover subscriptions share
//! the single listener.

use std::time::Duration;

use hearth_domain::sub::DiscoverSub;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

use crate::dispatch::Dispatcher;
use crate::updater::Updater;

const DHCP_SERVER_PORT: u16 = 67;

pub struct DiscoverEffect<M: Send + 'static> {
    dispatcher: Dispatcher<M>,
    updater: Updater<DiscoverSub<M>>,
    listener: Option<JoinHandle<()>>,
}

impl<M: Send + 'static> DiscoverEffect<M> {
    #[must_use]
    pub fn new(dispatcher: Dispatcher<M>) -> Self {
        Self {
            dispatcher,
            updater: Updater::new(|_| "dhcp".to_owned()),
            listener: None,
        }
    }

    /// Starts the listener when discover subscriptions appear and stops it
    /// when they all disappear. The set is keyed as a whole, so taggers are
    /// captured at the generation that starts the listener.
    pub fn apply(&mut self, specs: Vec<DiscoverSub<M>>) {
        let diff = self.updater.update(specs);
        if !diff.removed.is_empty() {
            self.stop_listener();
        }
        if !diff.added.is_empty() {
            let taggers: Vec<_> = diff.added.into_iter().map(|spec| spec.tagger).collect();
            self.listener = Some(tokio::spawn(listen(self.dispatcher.clone(), taggers)));
        }
    }

    fn stop_listener(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }

    #[cfg(test)]
    fn has_listener(&self) -> bool {
        self.listener.is_some()
    }
}

impl<M: Send + 'static> Drop for DiscoverEffect<M> {
    fn drop(&mut self) {
        self.stop_listener();
    }
}

async fn listen<M: Send + 'static>(dispatcher: Dispatcher<M>, taggers: Vec<fn(&str) -> Option<M>>) {
    let socket = match UdpSocket::bind(("0.0.0.0", DHCP_SERVER_PORT)).await {
        Ok(socket) => socket,
        Err(err) => {
            tracing::warn!(%err, "cannot bind dhcp discovery socket");
            return;
        }
    };
    tracing::debug!(port = DHCP_SERVER_PORT, "dhcp discovery listening");
    let mut buf = [0_u8; 1536];
    loop {
        match socket.recv_from(&mut buf).await {
            Ok((len, _)) => {
                let Some(mac) = parse_discover(&buf[..len]) else {
                    continue;
                };
                tracing::debug!(%mac, "dhcp discover");
                for tagger in &taggers {
                    if let Some(msg) = tagger(&mac) {
                        dispatcher.dispatch(msg);
                    }
                }
            }
            Err(err) => {
                tracing::warn!(%err, "dhcp discovery read failed");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

/// Returns the client MAC when `frame` is a DHCP DISCOVER from an ethernet
/// class device, `None` for anything else.
fn parse_discover(frame: &[u8]) -> Option<String> {
    // Fixed BOOTP header plus magic cookie.
    if frame.len() < 240 {
        return None;
    }
    // op BOOTREQUEST, htype ethernet, hlen 6.
    if frame[0] != 1 || frame[1] != 1 || frame[2] != 6 {
        return None;
    }
    if frame[236..240] != [99, 130, 83, 99] {
        return None;
    }
    let mut offset = 240;
    let mut is_discover = false;
    while offset < frame.len() {
        match frame[offset] {
            0 => offset += 1,
            255 => break,
            code => {
                let len = *frame.get(offset + 1)? as usize;
                let data = frame.get(offset + 2..offset + 2 + len)?;
                // Option 53: DHCP message type, 1 = DISCOVER.
                if code == 53 && data == [1] {
                    is_discover = true;
                }
                offset += 2 + len;
            }
        }
    }
    if !is_discover {
        return None;
    }
    let mac = frame[28..34]
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect::<Vec<_>>()
        .join(":");
    Some(mac)
}

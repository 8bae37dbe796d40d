//! Page DOM -> watcher -> router -> relay + display subscribers.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;

use coderelay_capture::{Document, Dom, MutationWatcher, PageInput, PageSelectors, PageSession};
use coderelay_core::{
    BusMessage, CaptureBus, DisplayEvent, Error, OutboundMessage, Result, TransportState,
};
use coderelay_relay::{RelaySink, Router, RouterHandle, StaticDestination};

#[derive(Default)]
struct FakeRelay {
    sent: Mutex<Vec<OutboundMessage>>,
    state: RwLock<TransportState>,
}

impl RelaySink for FakeRelay {
    fn send(&self, message: &OutboundMessage) -> Result<()> {
        if *self.state.read() != TransportState::Connected {
            return Err(Error::NotConnected);
        }
        self.sent.lock().push(message.clone());
        Ok(())
    }

    fn state(&self) -> TransportState {
        *self.state.read()
    }
}

fn connected_relay() -> Arc<FakeRelay> {
    let relay = Arc::new(FakeRelay::default());
    *relay.state.write() = TransportState::Connected;
    relay
}

async fn next_snippet(rx: &mut mpsc::UnboundedReceiver<DisplayEvent>) -> DisplayEvent {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("display event")
            .expect("router running");
        if matches!(event, DisplayEvent::DisplaySnippet { .. }) {
            return event;
        }
    }
}

fn finish_generation(code: &'static str) -> [PageInput<Dom>; 2] {
    let start: PageInput<Dom> = PageInput::Mutate(Box::new(move |dom: &mut Dom| {
        dom.append(dom.body(), "button", &[("data-testid", "stop-button")]);
        dom.append_with_text(dom.body(), "code", &[], code);
    }));
    let stop: PageInput<Dom> = PageInput::Mutate(Box::new(|dom: &mut Dom| {
        let selectors = PageSelectors::default();
        for button in dom.query_all(&selectors.stop_indicator) {
            dom.remove(button);
        }
    }));
    [start, stop]
}

#[tokio::test]
async fn test_finished_generation_reaches_relay_and_subscribers() {
    let relay = connected_relay();
    let (handle, inbox) = RouterHandle::channel();
    let router = Router::new(relay.clone(), Arc::new(StaticDestination::new(Some("/work/proj"))));
    let router_task = tokio::spawn(router.run(inbox));

    let (_, mut display) = handle.subscribe_display().unwrap();

    let watcher = MutationWatcher::new(handle.clone(), PageSelectors::default());
    let session = PageSession::new(Dom::new(), watcher)
        .with_initial_scan_delay(Duration::from_secs(3600));
    let (page_tx, page_rx) = mpsc::unbounded_channel();
    let session_task = tokio::spawn(session.run(page_rx));

    for input in finish_generation("// out/file.txt\nhello") {
        page_tx.send(input).unwrap();
    }

    match next_snippet(&mut display).await {
        DisplayEvent::DisplaySnippet { snippet } => {
            assert_eq!(snippet.file_path, "/work/proj/out/file.txt");
            assert_eq!(snippet.content, "hello");
        }
        other => panic!("unexpected {:?}", other),
    }

    // A second generation re-scans the old block but only relays the new one.
    for input in finish_generation("fn two() {}\n") {
        page_tx.send(input).unwrap();
    }
    match next_snippet(&mut display).await {
        DisplayEvent::DisplaySnippet { snippet } => {
            assert_eq!(snippet.file_path, "/work/proj/1.txt");
        }
        other => panic!("unexpected {:?}", other),
    }

    drop(page_tx);
    session_task.await.unwrap();
    drop(handle);
    router_task.await.unwrap();

    let sent = relay.sent.lock().clone();
    assert_eq!(sent.len(), 2);
    match &sent[0] {
        OutboundMessage::Capture(envelope) => {
            assert_eq!(envelope.file_path, "/work/proj/out/file.txt");
            assert_eq!(envelope.content, "hello");
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_send_to_chat_lands_in_prompt_input() {
    let relay = connected_relay();
    let (handle, inbox) = RouterHandle::channel();
    let router = Router::new(relay, Arc::new(StaticDestination::new(None)));
    let router_task = tokio::spawn(router.run(inbox));

    let mut dom = Dom::new();
    let prompt = dom.append(dom.body(), "div", &[("id", "prompt-textarea")]);
    let watcher = MutationWatcher::new(handle.clone(), PageSelectors::default());
    let session = PageSession::new(dom, watcher).with_initial_scan_delay(Duration::from_secs(3600));
    let (page_tx, page_rx) = mpsc::unbounded_channel();
    let session_task = tokio::spawn(session.run(page_rx));

    let (page_id, mut commands) = handle.attach_page().unwrap();
    handle
        .publish(BusMessage::SendToChat {
            content: "please fix\nthis".into(),
        })
        .unwrap();

    let command = tokio::time::timeout(Duration::from_secs(5), commands.recv())
        .await
        .unwrap()
        .unwrap();
    page_tx.send(PageInput::Command(command)).unwrap();
    drop(page_tx);
    let dom = session_task.await.unwrap();

    assert_eq!(
        dom.outer_html(prompt),
        "<div id=\"prompt-textarea\"><br>please fix<br>this</div>"
    );

    handle.detach_page(page_id).unwrap();
    drop(handle);
    let router = router_task.await.unwrap();
    assert!(!router.snapshot().source_active);
}

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{LOCAL, OTHER_PEER, PEER, SimulatedNode};
use openlcb_core::datagram::DatagramResult;
use openlcb_core::datagram::codes::reject;
use openlcb_core::{DatagramConfig, DatagramError, DatagramService, Message, MessageBody};
use parking_lot::Mutex;

fn service(node: &Arc<SimulatedNode>) -> DatagramService {
    DatagramService::new(LOCAL, node.clone(), DatagramConfig::default())
}

fn datagram_payloads(node: &SimulatedNode) -> Vec<Vec<u8>> {
    node.sent()
        .into_iter()
        .filter_map(|message| match message.body() {
            MessageBody::Datagram { data } => Some(data.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn unanswered_datagram_is_resent_then_fails() {
    let node = SimulatedNode::new(Vec::new());
    node.go_silent();
    let service = service(&node);
    tokio::spawn(service.clone().run_timeouts(Duration::from_millis(100)));

    let outcome: Arc<Mutex<Vec<DatagramResult>>> = Arc::default();
    let sink = outcome.clone();
    service
        .send_datagram(PEER, vec![0x20, 0x41], move |result| sink.lock().push(result))
        .expect("send");

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(outcome.lock().is_empty());
    assert_eq!(datagram_payloads(&node).len(), 2);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(
        *outcome.lock(),
        vec![Err(DatagramError::Timeout { attempts: 3 })]
    );
    assert_eq!(datagram_payloads(&node), vec![vec![0x20, 0x41]; 3]);
    assert_eq!(service.outstanding(PEER), 0);
}

#[tokio::test(start_paused = true)]
async fn ack_before_deadline_stops_resending() {
    let node = SimulatedNode::new(Vec::new());
    node.go_silent();
    let service = service(&node);
    tokio::spawn(service.clone().run_timeouts(Duration::from_millis(100)));

    let outcome: Arc<Mutex<Vec<DatagramResult>>> = Arc::default();
    let sink = outcome.clone();
    service
        .send_datagram(PEER, vec![0x20, 0x41], move |result| sink.lock().push(result))
        .expect("send");
    tokio::time::sleep(Duration::from_secs(4)).await;
    service.handle_message(&Message::datagram_received_ok(PEER, LOCAL, 0));
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(outcome.lock().len(), 1);
    assert!(outcome.lock()[0].is_ok());
    assert_eq!(datagram_payloads(&node).len(), 2);
}

#[test]
fn rejection_is_final_even_when_temporary() {
    let node = SimulatedNode::new(Vec::new());
    node.go_silent();
    let service = service(&node);

    let outcome: Arc<Mutex<Vec<DatagramResult>>> = Arc::default();
    let sink = outcome.clone();
    service
        .send_datagram(PEER, vec![0x20, 0x41], move |result| sink.lock().push(result))
        .expect("send");
    service.handle_message(&Message::datagram_rejected(
        PEER,
        LOCAL,
        reject::BUFFER_UNAVAILABLE,
    ));

    assert_eq!(
        *outcome.lock(),
        vec![Err(DatagramError::Rejected {
            code: reject::BUFFER_UNAVAILABLE
        })]
    );
    assert_eq!(datagram_payloads(&node).len(), 1);
    assert_eq!(service.outstanding(PEER), 0);
}

#[test]
fn queued_send_starts_after_previous_handler_returns() {
    let node = SimulatedNode::new(Vec::new());
    node.go_silent();
    let service = service(&node);
    let order: Arc<Mutex<Vec<String>>> = Arc::default();

    let log = order.clone();
    let observer = node.clone();
    service
        .send_datagram(PEER, vec![1], move |_| {
            let sent = observer.sent().len();
            log.lock().push(format!("first done after {sent} sends"));
        })
        .expect("send");
    let log = order.clone();
    service
        .send_datagram(PEER, vec![2], move |_| log.lock().push("second done".to_string()))
        .expect("send");

    service.handle_message(&Message::datagram_received_ok(PEER, LOCAL, 0));
    assert_eq!(datagram_payloads(&node), vec![vec![1], vec![2]]);
    service.handle_message(&Message::datagram_received_ok(PEER, LOCAL, 0));

    assert_eq!(
        *order.lock(),
        vec!["first done after 1 sends".to_string(), "second done".to_string()]
    );
}

#[test]
fn ack_for_another_node_is_ignored() {
    let node = SimulatedNode::new(Vec::new());
    node.go_silent();
    let service = service(&node);
    let outcome: Arc<Mutex<Vec<DatagramResult>>> = Arc::default();
    let sink = outcome.clone();
    service
        .send_datagram(PEER, vec![1], move |result| sink.lock().push(result))
        .expect("send");

    service.handle_message(&Message::datagram_received_ok(PEER, PEER, 0));
    assert!(outcome.lock().is_empty());
    assert_eq!(service.outstanding(PEER), 1);
}

#[test]
fn distinct_peers_do_not_wait_for_each_other() {
    let node = SimulatedNode::new(Vec::new());
    node.go_silent();
    let service = service(&node);
    let outcome: Arc<Mutex<Vec<(&'static str, bool)>>> = Arc::default();

    let sink = outcome.clone();
    service
        .send_datagram(PEER, vec![1], move |result| sink.lock().push(("peer", result.is_ok())))
        .expect("send");
    let sink = outcome.clone();
    service
        .send_datagram(OTHER_PEER, vec![2], move |result| {
            sink.lock().push(("other", result.is_ok()))
        })
        .expect("send");

    let destinations: Vec<_> = node
        .sent()
        .iter()
        .map(|message| message.destination())
        .collect();
    assert_eq!(destinations, vec![Some(PEER), Some(OTHER_PEER)]);
    assert_eq!(service.outstanding(PEER), 1);
    assert_eq!(service.outstanding(OTHER_PEER), 1);

    service.handle_message(&Message::datagram_rejected(OTHER_PEER, LOCAL, 0x1000));
    assert_eq!(*outcome.lock(), vec![("other", false)]);
    assert_eq!(service.outstanding(PEER), 1);

    service.handle_message(&Message::datagram_received_ok(PEER, LOCAL, 0));
    assert_eq!(*outcome.lock(), vec![("other", false), ("peer", true)]);
}

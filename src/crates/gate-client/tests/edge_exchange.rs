//! Integration tests for the edge side of an exchange.
//!
//! The service is played by a bare [`FrameCipher`]: it opens what the edge
//! session sends and seals the answer, as the real dispatcher does.  The
//! response topic is shared by every device, so the edge session must pick
//! out its own reply among others.

use gate_client::{EdgeSession, ResponseError};
use gate_core::{Command, FrameCipher, Reply, SharedSecret};

const SECRET: &str = "PARKING_SECRET_KEY";

fn service() -> FrameCipher {
    FrameCipher::new(SharedSecret::from(SECRET))
}

#[test]
fn test_edge_request_is_answered_by_service() {
    // Arrange
    let mut edge = EdgeSession::with_id(SharedSecret::from(SECRET), 7);
    let command = Command::Add {
        uid: "04A1B2C3".into(),
        name: "Jeanne Martin".into(),
    };
    let request = edge.prepare(&command).expect("prepare");

    // Act: the service opens the frame and answers under the same nonce
    let opened = service()
        .open_request(request.frame().as_bytes())
        .expect("service opens request");
    let parsed = Command::parse(&opened.payload).expect("service parses command");
    let answer = service()
        .seal_reply(&Reply::Added { uid: parsed.uid().to_string() }.to_string(), opened.nonce)
        .expect("seal reply");

    // Assert
    assert_eq!(parsed, command);
    assert_eq!(
        request.accept(answer.as_bytes()).expect("accept"),
        Reply::Added {
            uid: "04A1B2C3".into()
        }
    );
}

#[test]
fn test_edge_skips_replies_meant_for_other_devices() {
    // Arrange: two devices in flight on the same response topic
    let mut ours = EdgeSession::with_id(SharedSecret::from(SECRET), 1);
    let mut theirs = EdgeSession::with_id(SharedSecret::from(SECRET), 2);
    let our_request = ours
        .prepare_with_nonce(&Command::Check { uid: "AB12".into() }, 100)
        .expect("prepare");
    let their_request = theirs
        .prepare_with_nonce(&Command::Check { uid: "CD34".into() }, 200)
        .expect("prepare");

    let their_reply = service()
        .seal_reply("CHECK;CD34;NO", their_request.nonce())
        .expect("seal");
    let our_reply = service()
        .seal_reply("CHECK;AB12;OK;Alice", our_request.nonce())
        .expect("seal");

    // Act / Assert
    assert!(matches!(
        our_request.accept(their_reply.as_bytes()),
        Err(ResponseError::Unauthenticated(_))
    ));
    assert_eq!(
        our_request.accept(our_reply.as_bytes()).expect("accept"),
        Reply::Authorized {
            uid: "AB12".into(),
            name: "Alice".into()
        }
    );
}

#[test]
fn test_reply_forged_with_wrong_secret_is_not_accepted() {
    let mut edge = EdgeSession::with_id(SharedSecret::from(SECRET), 1);
    let request = edge
        .prepare_with_nonce(&Command::Delete { uid: "AB12".into() }, 5)
        .expect("prepare");
    let forged = FrameCipher::new(SharedSecret::from("WRONG"))
        .seal_reply("DEL;AB12;OK", 5)
        .expect("seal");
    assert!(request.accept(forged.as_bytes()).is_err());
}

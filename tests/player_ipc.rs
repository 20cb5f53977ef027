use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use video_screensaver::events::{
    InputEvent, Key, MediaEvent, PlayerEvent, PlayerNotice, PointerPosition,
};
use video_screensaver::session::MediaEngine;
use video_screensaver::tasks::player::{self, PlayerHandle};

async fn next_json<R>(lines: &mut tokio::io::Lines<R>) -> Value
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    let line = tokio::time::timeout(Duration::from_secs(2), lines.next_line())
        .await
        .expect("timeout waiting for player command")
        .expect("read failed")
        .expect("ipc closed");
    serde_json::from_str(&line).expect("command is json")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn commands_are_written_as_json_lines() {
    let (ours, theirs) = tokio::io::duplex(4096);
    let (mut handle, commands) = PlayerHandle::channel(0);
    let (events_tx, _events_rx) = mpsc::channel::<PlayerEvent>(8);
    let cancel = CancellationToken::new();

    let task = tokio::spawn(player::drive(ours, 0, commands, events_tx, cancel.clone()));

    handle.set_volume(0.4);
    handle.play("/videos/a.mp4");
    handle.show_overlay("hello", Some(12.0));

    let (reader, _writer) = tokio::io::split(theirs);
    let mut lines = BufReader::new(reader).lines();

    let volume = next_json(&mut lines).await;
    assert_eq!(volume["command"][0], "set_property");
    assert_eq!(volume["command"][1], "volume");
    assert!((volume["command"][2].as_f64().unwrap() - 40.0).abs() < 1e-9);

    let load = next_json(&mut lines).await;
    assert_eq!(
        load["command"],
        serde_json::json!(["loadfile", "/videos/a.mp4", "replace"])
    );
    assert!(load["request_id"].as_u64().unwrap() > volume["request_id"].as_u64().unwrap());

    let overlay = next_json(&mut lines).await;
    assert_eq!(overlay["command"]["name"], "osd-overlay");
    assert_eq!(overlay["command"]["data"], "{\\an5\\fs12}hello");

    cancel.cancel();
    let quit = next_json(&mut lines).await;
    assert_eq!(quit["command"], serde_json::json!(["quit"]));

    task.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn player_events_are_forwarded_with_screen() {
    let (ours, theirs) = tokio::io::duplex(4096);
    let (_handle, commands) = PlayerHandle::channel(2);
    let (events_tx, mut events_rx) = mpsc::channel::<PlayerEvent>(8);
    let cancel = CancellationToken::new();

    let task = tokio::spawn(player::drive(ours, 2, commands, events_tx, cancel.clone()));

    let (_reader, mut writer) = tokio::io::split(theirs);
    let script = concat!(
        r#"{"request_id":1,"error":"success","data":null}"#,
        "\n",
        r#"{"event":"file-loaded"}"#,
        "\n",
        r#"{"event":"end-file","reason":"stop"}"#,
        "\n",
        "garbage\n",
        r#"{"event":"end-file","reason":"error","file_error":"unrecognized file format"}"#,
        "\n",
        r#"{"event":"end-file","reason":"eof"}"#,
        "\n",
    );
    writer.write_all(script.as_bytes()).await.unwrap();
    writer.flush().await.unwrap();

    let mut received = Vec::new();
    while received.len() < 3 {
        let ev = tokio::time::timeout(Duration::from_secs(2), events_rx.recv())
            .await
            .expect("timeout waiting for player event")
            .expect("event channel closed");
        received.push(ev);
    }
    assert_eq!(
        received,
        vec![
            PlayerEvent {
                screen: 2,
                notice: PlayerNotice::Media(MediaEvent::Started)
            },
            PlayerEvent {
                screen: 2,
                notice: PlayerNotice::Media(MediaEvent::Failed("unrecognized file format".into()))
            },
            PlayerEvent {
                screen: 2,
                notice: PlayerNotice::Media(MediaEvent::Ended)
            },
        ]
    );

    cancel.cancel();
    task.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn closed_ipc_ends_the_driver() {
    let (ours, theirs) = tokio::io::duplex(1024);
    let (_handle, commands) = PlayerHandle::channel(0);
    let (events_tx, _events_rx) = mpsc::channel::<PlayerEvent>(8);
    let cancel = CancellationToken::new();

    let task = tokio::spawn(player::drive(ours, 0, commands, events_tx, cancel));
    drop(theirs);

    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("driver should stop when the player goes away")
        .unwrap()
        .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dropped_handle_ends_the_driver() {
    let (ours, _theirs) = tokio::io::duplex(1024);
    let (handle, commands) = PlayerHandle::channel(0);
    let (events_tx, _events_rx) = mpsc::channel::<PlayerEvent>(8);
    let cancel = CancellationToken::new();

    let task = tokio::spawn(player::drive(ours, 0, commands, events_tx, cancel));
    drop(handle);

    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("driver should stop once nobody can send commands")
        .unwrap()
        .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn standalone_player_input_is_forwarded() {
    let (ours, theirs) = tokio::io::duplex(4096);
    let (handle, commands) = PlayerHandle::channel(1);
    let (events_tx, mut events_rx) = mpsc::channel::<PlayerEvent>(8);
    let cancel = CancellationToken::new();

    let task = tokio::spawn(player::drive(ours, 1, commands, events_tx, cancel.clone()));
    handle.observe_pointer();

    let (reader, mut writer) = tokio::io::split(theirs);
    let mut lines = BufReader::new(reader).lines();
    let observe = next_json(&mut lines).await;
    assert_eq!(
        observe["command"],
        serde_json::json!(["observe_property", 1, "mouse-pos"])
    );

    let script = concat!(
        r#"{"event":"property-change","id":1,"name":"mouse-pos","data":{"x":0,"y":0,"hover":false}}"#,
        "\n",
        r#"{"event":"property-change","id":1,"name":"mouse-pos","data":{"x":10,"y":20,"hover":true}}"#,
        "\n",
        r#"{"event":"client-message","args":["video-screensaver-input","wheel","120"]}"#,
        "\n",
        r#"{"event":"client-message","args":["video-screensaver-input","key","other"]}"#,
        "\n",
    );
    writer.write_all(script.as_bytes()).await.unwrap();
    writer.flush().await.unwrap();

    let mut received = Vec::new();
    while received.len() < 3 {
        let ev = tokio::time::timeout(Duration::from_secs(2), events_rx.recv())
            .await
            .expect("timeout waiting for player input")
            .expect("event channel closed");
        assert_eq!(ev.screen, 1);
        received.push(ev.notice);
    }
    assert_eq!(
        received,
        vec![
            PlayerNotice::Input(InputEvent::MouseMove(PointerPosition { x: 10.0, y: 20.0 })),
            PlayerNotice::Input(InputEvent::MouseWheel { delta: 120.0 }),
            PlayerNotice::Input(InputEvent::KeyDown(Key::Other)),
        ]
    );

    cancel.cancel();
    task.await.unwrap().unwrap();
}

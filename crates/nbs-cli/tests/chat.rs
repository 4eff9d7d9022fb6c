//! End-to-end runs of the `nbs-chat` binary.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::thread;

use tempfile::{tempdir, TempDir};

fn nbs_chat(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_nbs-chat"))
        .args(args)
        .output()
        .expect("failed to run nbs-chat")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn new_chat() -> (TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    let chat = dir.path().join("room.chat");
    let out = nbs_chat(&["create", chat.to_str().unwrap()]);
    assert!(out.status.success());
    (dir, chat)
}

fn send(chat: &Path, handle: &str, message: &str) {
    let out = nbs_chat(&["send", chat.to_str().unwrap(), handle, message]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
}

#[test]
fn create_send_read() {
    let (_dir, chat) = new_chat();
    send(&chat, "alice", "hello");
    send(&chat, "bob", "hi alice");

    let out = nbs_chat(&["read", chat.to_str().unwrap()]);
    assert!(out.status.success());
    assert_eq!(stdout(&out), "alice: hello\nbob: hi alice\n");

    let out = nbs_chat(&["participants", chat.to_str().unwrap()]);
    assert_eq!(
        stdout(&out),
        format!("{:<24} 1 messages\n{:<24} 1 messages\n", "alice", "bob")
    );
}

#[test]
fn header_length_matches_file_size() {
    let (_dir, chat) = new_chat();
    for i in 0..20 {
        send(&chat, "writer", &"x".repeat(i * 7));
    }
    let text = fs::read_to_string(&chat).unwrap();
    let declared: u64 = text
        .lines()
        .find_map(|l| l.strip_prefix("file-length: "))
        .unwrap()
        .parse()
        .unwrap();
    assert_eq!(declared, fs::metadata(&chat).unwrap().len());
}

#[test]
fn concurrent_processes_lose_no_messages() {
    let (_dir, chat) = new_chat();
    let writers: Vec<_> = (0..4)
        .map(|w| {
            let chat = chat.clone();
            thread::spawn(move || {
                for i in 0..5 {
                    send(&chat, &format!("w{w}"), &format!("message {i}"));
                }
            })
        })
        .collect();
    for w in writers {
        w.join().unwrap();
    }

    let out = nbs_chat(&["read", chat.to_str().unwrap()]);
    assert_eq!(stdout(&out).lines().count(), 20);
    let out = nbs_chat(&["participants", chat.to_str().unwrap()]);
    for w in 0..4 {
        assert!(stdout(&out).contains(&format!("{:<24} 5 messages", format!("w{w}"))));
    }
}

#[test]
fn unread_cursor_round_trip() {
    let (_dir, chat) = new_chat();
    for m in ["one", "two", "three"] {
        send(&chat, "writer", m);
    }
    let path = chat.to_str().unwrap();
    let out = nbs_chat(&["read", path, "--unread=reader"]);
    assert_eq!(stdout(&out), "writer: one\nwriter: two\nwriter: three\n");

    let out = nbs_chat(&["cursor", path, "reader"]);
    assert_eq!(stdout(&out), "2\n");

    let out = nbs_chat(&["read", path, "--unread=reader"]);
    assert_eq!(stdout(&out), "");

    let cursors = fs::read_to_string(format!("{path}.cursors")).unwrap();
    assert!(cursors.starts_with("# Read cursors"));
    assert!(cursors.contains("reader=2\n"));
    assert!(cursors.contains("writer=2\n"));
}

#[test]
fn exit_codes() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("absent.chat");
    let missing = missing.to_str().unwrap();

    assert_eq!(nbs_chat(&["send", missing, "alice", "hi"]).status.code(), Some(2));
    assert_eq!(nbs_chat(&["read", missing]).status.code(), Some(2));
    assert_eq!(nbs_chat(&["frobnicate"]).status.code(), Some(4));
    assert_eq!(nbs_chat(&[]).status.code(), Some(4));
    assert_eq!(nbs_chat(&["--help"]).status.code(), Some(0));

    let (_dir, chat) = new_chat();
    let path = chat.to_str().unwrap();
    assert_eq!(nbs_chat(&["create", path]).status.code(), Some(1));
    assert_eq!(nbs_chat(&["send", path, "bad handle", "hi"]).status.code(), Some(4));
    assert_eq!(
        nbs_chat(&["poll", path, "alice", "--timeout=0"]).status.code(),
        Some(3)
    );
}

#[test]
fn poll_wakes_on_other_participant() {
    let (_dir, chat) = new_chat();
    let poller = {
        let chat = chat.clone();
        thread::spawn(move || nbs_chat(&["poll", chat.to_str().unwrap(), "alice", "--timeout=10"]))
    };
    thread::sleep(std::time::Duration::from_millis(500));
    send(&chat, "bob", "wake up");

    let out = poller.join().unwrap();
    assert_eq!(out.status.code(), Some(0));
    assert_eq!(stdout(&out), "bob: wake up\n");
}

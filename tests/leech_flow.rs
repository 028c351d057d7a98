use std::collections::HashMap;
use std::time::Duration;

use bittorrent_peer::bencode::value::Dict;
use bittorrent_peer::bencode::BencodeValue;
use bittorrent_peer::engine::block::BlockPlan;
use bittorrent_peer::engine::connection::spawn_connection;
use bittorrent_peer::engine::dispatcher::{Dispatcher, NewSession};
use bittorrent_peer::engine::store;
use bittorrent_peer::metainfo::{from_bencode, Metainfo};
use bittorrent_peer::wire::{Handshake, Message};
use bittorrent_peer::{LEECH_PEER_ID, SEED_PEER_ID};
use sha1::{Digest, Sha1};
use tokio::sync::{mpsc, watch};

/// A two-piece, single-file torrent small enough to exercise the full
/// handshake-through-verified-write path without a real block-sized file.
fn two_piece_metainfo(piece_a: &[u8], piece_b: &[u8]) -> Metainfo {
    let mut hash_a = Sha1::new();
    hash_a.update(piece_a);
    let hash_a: [u8; 20] = hash_a.finalize().into();

    let mut hash_b = Sha1::new();
    hash_b.update(piece_b);
    let hash_b: [u8; 20] = hash_b.finalize().into();

    let mut pieces = Vec::new();
    pieces.extend_from_slice(&hash_a);
    pieces.extend_from_slice(&hash_b);

    let total_length = piece_a.len() + piece_b.len();
    let info: Dict = vec![
        (b"name".to_vec(), BencodeValue::String("payload.bin".to_string())),
        (
            b"piece length".to_vec(),
            BencodeValue::Integer(piece_a.len() as i64),
        ),
        (b"length".to_vec(), BencodeValue::Integer(total_length as i64)),
        (b"pieces".to_vec(), BencodeValue::Bytes(pieces)),
    ];
    let top: Dict = vec![
        (b"announce".to_vec(), BencodeValue::String(String::new())),
        (b"info".to_vec(), BencodeValue::Dictionary(info)),
    ];
    from_bencode(&BencodeValue::Dictionary(top)).unwrap()
}

/// Mirrors what `engine::connection::connect_and_spawn` does at
/// `connection_made` for a real dial: send the handshake, then immediately
/// enqueue every block request the file needs, as one atomic step — these
/// tests wire up connections by hand instead of dialing a real socket, so
/// they have to reproduce that ordering themselves.
fn send_handshake_and_request_all(
    outbound: &mpsc::UnboundedSender<Vec<u8>>,
    info_hash: [u8; 20],
    metainfo: &Metainfo,
) {
    let handshake = Handshake::new(info_hash, LEECH_PEER_ID);
    outbound.send(handshake.to_bytes()).unwrap();

    let plan = BlockPlan::from_metainfo(metainfo);
    for block in plan.request_all() {
        outbound
            .send(
                Message::Request {
                    index: block.index,
                    begin: block.begin,
                    length: block.length,
                }
                .encode(),
            )
            .unwrap();
    }
}

/// Drives a full leech against an in-process seed over a `tokio::io::duplex`
/// pair: no real socket, just the handshake, bitfield, and request/piece
/// exchange running through two live `Dispatcher`s.
#[tokio::test]
async fn leech_recovers_the_seeded_file_byte_for_byte() {
    let piece_a = b"the quick brown fox";
    let piece_b = b"jumps over a lazy dg"; // same length as piece_a
    let metainfo = two_piece_metainfo(piece_a, piece_b);
    let info_hash = metainfo.infohash();

    let test_dir = std::env::temp_dir().join(format!(
        "bittorrent-peer-leech-flow-{}",
        std::process::id()
    ));
    std::fs::create_dir_all(&test_dir).unwrap();

    let seed_path = test_dir.join("seed.bin");
    std::fs::write(&seed_path, [piece_a.as_slice(), piece_b.as_slice()].concat()).unwrap();
    let seed_file = store::open_read_only(&seed_path).unwrap();

    let dest_path = test_dir.join("dest.bin");
    let dest_file = store::open_read_write(&dest_path, metainfo.total_size()).unwrap();

    let (client_half, server_half) = tokio::io::duplex(64 * 1024);

    // Seed side: an accepted connection, doesn't know the infohash yet.
    let (seed_outbound, seed_inbound) = spawn_connection(server_half, 1);
    let mut seed_torrents = HashMap::new();
    seed_torrents.insert(info_hash, metainfo.clone());
    let mut seed_files = HashMap::new();
    seed_files.insert(info_hash, seed_file);
    let (seed_new_tx, seed_new_rx) = mpsc::unbounded_channel();
    let (_seed_shutdown_tx, seed_shutdown_rx) = watch::channel(false);
    seed_new_tx
        .send(NewSession {
            id: 1,
            peer_addr: "test-seed-peer".to_string(),
            expected_info_hash: None,
            inbound: seed_inbound,
            outbound: seed_outbound,
        })
        .unwrap();
    let seed_dispatcher = Dispatcher::new(
        SEED_PEER_ID,
        seed_torrents,
        seed_files,
        seed_new_rx,
        seed_shutdown_rx,
    );
    let seed_task = tokio::spawn(seed_dispatcher.run());

    // Leech side: dials out, so it sends its handshake and full request set
    // immediately, before the session is even registered with the dispatcher.
    let (leech_outbound, leech_inbound) = spawn_connection(client_half, 2);
    send_handshake_and_request_all(&leech_outbound, info_hash, &metainfo);

    let mut leech_torrents = HashMap::new();
    leech_torrents.insert(info_hash, metainfo.clone());
    let mut leech_files = HashMap::new();
    leech_files.insert(info_hash, dest_file);
    let (leech_new_tx, leech_new_rx) = mpsc::unbounded_channel();
    let (_leech_shutdown_tx, leech_shutdown_rx) = watch::channel(false);
    leech_new_tx
        .send(NewSession {
            id: 2,
            peer_addr: "test-leech-peer".to_string(),
            expected_info_hash: Some(info_hash),
            inbound: leech_inbound,
            outbound: leech_outbound,
        })
        .unwrap();
    let leech_dispatcher = Dispatcher::new(
        LEECH_PEER_ID,
        leech_torrents,
        leech_files,
        leech_new_rx,
        leech_shutdown_rx,
    );
    let leech_task = tokio::spawn(leech_dispatcher.run());

    // Both dispatchers run forever until told to stop (matching production
    // behavior, which waits on Ctrl-C) — poll the destination file instead
    // of waiting for either task to finish on its own.
    let expected = [piece_a.as_slice(), piece_b.as_slice()].concat();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if std::fs::read(&dest_path).unwrap_or_default() == expected {
            break;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("leech did not converge on the seeded content in time");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    seed_task.abort();
    leech_task.abort();
    std::fs::remove_dir_all(&test_dir).ok();
}

/// Two independent leech sessions against the same seeder, each fetching
/// into its own destination file, both converge on byte-identical content.
#[tokio::test]
async fn two_concurrent_leechers_each_recover_the_full_file() {
    let piece_a = b"0123456789abcdef0123";
    let piece_b = b"fedcba9876543210fedc";
    let metainfo = two_piece_metainfo(piece_a, piece_b);
    let info_hash = metainfo.infohash();

    let test_dir = std::env::temp_dir().join(format!(
        "bittorrent-peer-leech-flow-concurrent-{}",
        std::process::id()
    ));
    std::fs::create_dir_all(&test_dir).unwrap();

    let seed_path = test_dir.join("seed.bin");
    std::fs::write(&seed_path, [piece_a.as_slice(), piece_b.as_slice()].concat()).unwrap();
    let seed_file = store::open_read_only(&seed_path).unwrap();

    let mut seed_torrents = HashMap::new();
    seed_torrents.insert(info_hash, metainfo.clone());
    let mut seed_files = HashMap::new();
    seed_files.insert(info_hash, seed_file);
    let (seed_new_tx, seed_new_rx) = mpsc::unbounded_channel();
    let (_seed_shutdown_tx, seed_shutdown_rx) = watch::channel(false);
    let seed_dispatcher = Dispatcher::new(
        SEED_PEER_ID,
        seed_torrents,
        seed_files,
        seed_new_rx,
        seed_shutdown_rx,
    );
    let seed_task = tokio::spawn(seed_dispatcher.run());

    let mut leech_tasks = Vec::new();
    let mut dest_paths = Vec::new();
    let expected = [piece_a.as_slice(), piece_b.as_slice()].concat();

    for n in 0..2u64 {
        let session_id = 10 + n;
        let dest_path = test_dir.join(format!("dest-{n}.bin"));
        let dest_file = store::open_read_write(&dest_path, metainfo.total_size()).unwrap();
        dest_paths.push(dest_path);

        let (client_half, server_half) = tokio::io::duplex(64 * 1024);

        let (seed_outbound, seed_inbound) = spawn_connection(server_half, session_id);
        seed_new_tx
            .send(NewSession {
                id: session_id,
                peer_addr: format!("test-seed-peer-{n}"),
                expected_info_hash: None,
                inbound: seed_inbound,
                outbound: seed_outbound,
            })
            .unwrap();

        let (leech_outbound, leech_inbound) = spawn_connection(client_half, session_id);
        send_handshake_and_request_all(&leech_outbound, info_hash, &metainfo);

        let mut leech_torrents = HashMap::new();
        leech_torrents.insert(info_hash, metainfo.clone());
        let mut leech_files = HashMap::new();
        leech_files.insert(info_hash, dest_file);
        let (leech_new_tx, leech_new_rx) = mpsc::unbounded_channel();
        let (_leech_shutdown_tx, leech_shutdown_rx) = watch::channel(false);
        leech_new_tx
            .send(NewSession {
                id: session_id,
                peer_addr: format!("test-leech-peer-{n}"),
                expected_info_hash: Some(info_hash),
                inbound: leech_inbound,
                outbound: leech_outbound,
            })
            .unwrap();
        let leech_dispatcher = Dispatcher::new(
            LEECH_PEER_ID,
            leech_torrents,
            leech_files,
            leech_new_rx,
            leech_shutdown_rx,
        );
        leech_tasks.push(tokio::spawn(leech_dispatcher.run()));
    }

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let all_done = dest_paths
            .iter()
            .all(|p| std::fs::read(p).unwrap_or_default() == expected);
        if all_done {
            break;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("not all leechers converged on the seeded content in time");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    for (n, path) in dest_paths.iter().enumerate() {
        let written = std::fs::read(path).unwrap();
        assert_eq!(written, expected, "leecher {n} diverged from the seeded content");
    }

    seed_task.abort();
    for task in leech_tasks {
        task.abort();
    }
    std::fs::remove_dir_all(&test_dir).ok();
}

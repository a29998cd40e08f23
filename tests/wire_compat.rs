//! Byte-level wire format tests
//!
//! These tests pin the exact frames a sender puts on the wire by receiving
//! them with a raw PAIR socket: header and metadata text, frame counts,
//! more-flags and the big-endian payload encoding.

use std::thread;

use bytes::BufMut;

use imgtransfer_rust::{send_image, Backend, ImageDescriptor, Metadata, VoxelType};

/// A 3-D unsigned 16-bit image in array layout fits one payload frame
#[test]
fn test_array_u16_wire_capture() {
    let port = 54701;

    let peer = thread::spawn(move || {
        let context = zmq::Context::new();
        let socket = context.socket(zmq::PAIR).unwrap();
        socket.bind(&format!("tcp://*:{port}")).unwrap();

        // header travels alone, without the more-flag
        let header = socket.recv_bytes(0).unwrap();
        assert_eq!(header, b"v1 dimNumber 3 4 3 2 UnsignedShortType ArrayImg ");
        assert!(!socket.get_rcvmore().unwrap());

        socket.send("ready", 0).unwrap();

        // metadata opens the multi-part payload message
        let metadata = socket.recv_bytes(0).unwrap();
        assert_eq!(
            metadata,
            b"metadata__QWE__imagename__QWE__test__QWE__endmetadata"
        );
        assert!(socket.get_rcvmore().unwrap());

        // one 48-byte big-endian payload frame closes the message
        let payload = socket.recv_bytes(0).unwrap();
        let mut expected = Vec::with_capacity(48);
        for value in 0..24u16 {
            expected.put_u16(value);
        }
        assert_eq!(payload, expected);
        assert!(!socket.get_rcvmore().unwrap());

        socket.send("done", 0).unwrap();
    });

    let desc =
        ImageDescriptor::new(vec![4, 3, 2], VoxelType::UnsignedShort, Backend::Array).unwrap();
    let mut data = Vec::with_capacity(48);
    for value in 0..24u16 {
        data.extend_from_slice(&value.to_ne_bytes());
    }
    let snapshot = data.clone();

    send_image(
        &desc,
        &mut data,
        &Metadata::new("test"),
        &format!("localhost:{port}"),
        10,
    )
    .unwrap();

    // the in-place flip must be undone before send_image returns
    assert_eq!(data, snapshot);

    peer.join().unwrap();
}

/// A 4-D float image in planar layout splits every plane into four frames,
/// and only the very last frame of the last plane drops the more-flag
#[test]
fn test_planar_f32_split_framing() {
    let port = 54702;

    let peer = thread::spawn(move || {
        let context = zmq::Context::new();
        let socket = context.socket(zmq::PAIR).unwrap();
        socket.bind(&format!("tcp://*:{port}")).unwrap();

        let header = socket.recv_bytes(0).unwrap();
        assert_eq!(header, b"v1 dimNumber 4 64 64 2 2 FloatType PlanarImg ");
        socket.send("ready", 0).unwrap();

        let metadata = socket.recv_bytes(0).unwrap();
        assert!(metadata.starts_with(b"metadata__QWE__"));
        assert!(socket.get_rcvmore().unwrap());

        // 4 planes, each split into 4 sub-blocks of 1024 voxels
        let total_frames = 16;
        for frame in 0..total_frames {
            let block = socket.recv_bytes(0).unwrap();
            assert_eq!(block.len(), 4096, "frame {frame} has the wrong length");
            let more = socket.get_rcvmore().unwrap();
            if frame < total_frames - 1 {
                assert!(more, "frame {frame} must flag a following frame");
            } else {
                assert!(!more, "the final frame must close the message");
            }
        }

        socket.send("done", 0).unwrap();
    });

    let desc =
        ImageDescriptor::new(vec![64, 64, 2, 2], VoxelType::Float, Backend::Planar).unwrap();
    let mut data = Vec::with_capacity(desc.byte_count().unwrap());
    for index in 0..desc.voxel_count() {
        data.extend_from_slice(&(index as f32).to_ne_bytes());
    }

    send_image(
        &desc,
        &mut data,
        &Metadata::new("planar stack"),
        &format!("localhost:{port}"),
        10,
    )
    .unwrap();

    peer.join().unwrap();
}

/// The pull pairing opens with the literal request frame
#[test]
fn test_pull_pairing_request_frame() {
    let port = 54703;

    let peer = thread::spawn(move || {
        let context = zmq::Context::new();
        let socket = context.socket(zmq::PAIR).unwrap();
        socket.bind(&format!("tcp://*:{port}")).unwrap();

        let request = socket.recv_bytes(0).unwrap();
        assert_eq!(request, b"can get");

        // serve a minimal 1-D image by hand
        socket
            .send("v1 dimNumber 1 4 ByteType ArrayImg ", 0)
            .unwrap();
        let ready = socket.recv_bytes(0).unwrap();
        assert_eq!(ready, b"ready");
        socket
            .send("metadata__QWE__imagename__QWE__tiny__QWE__endmetadata", zmq::SNDMORE)
            .unwrap();
        socket.send(&[1u8, 2, 3, 4][..], 0).unwrap();
        let done = socket.recv_bytes(0).unwrap();
        assert_eq!(done, b"done");
    });

    let image = imgtransfer_rust::request_image(&format!("localhost:{port}"), 10).unwrap();
    assert_eq!(image.descriptor.sizes(), &[4]);
    assert_eq!(image.metadata.image_name(), Some("tiny"));
    assert_eq!(image.data, vec![1, 2, 3, 4]);

    peer.join().unwrap();
}

/// A header frame filling the whole receive buffer counts as truncated
#[test]
fn test_oversized_header_is_rejected() {
    let port = 54704;

    let peer = thread::spawn(move || {
        let context = zmq::Context::new();
        let socket = context.socket(zmq::PAIR).unwrap();
        socket.connect(&format!("tcp://localhost:{port}")).unwrap();
        socket.send("v1 ".repeat(400).as_bytes(), 0).unwrap();
    });

    let result = imgtransfer_rust::receive_image(port, 10);
    assert!(matches!(result, Err(imgtransfer_rust::Error::Protocol(_))));

    peer.join().unwrap();
}

/// An unknown voxel type survives parsing and fails when queried
#[test]
fn test_unknown_voxel_type_aborts_the_session() {
    let port = 54705;

    let peer = thread::spawn(move || {
        let context = zmq::Context::new();
        let socket = context.socket(zmq::PAIR).unwrap();
        socket.connect(&format!("tcp://localhost:{port}")).unwrap();
        socket
            .send("v1 dimNumber 2 4 4 FooType ArrayImg ", 0)
            .unwrap();
    });

    let result = imgtransfer_rust::receive_image(port, 10);
    assert!(matches!(result, Err(imgtransfer_rust::Error::Protocol(_))));

    peer.join().unwrap();
}

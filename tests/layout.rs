// Layout conformance tests for the ring header shared between processes.
// They assert sizes, alignments and field offsets of MessageMeta and print
// the observed values to aid debugging on a mismatch.
use memoffset::offset_of;
use std::mem::{align_of, size_of};
use xapp_frame::Transport::Buffer::layout::{ChannelEntry, GlobalHeader, MAX_CHANNELS};
use xapp_frame::Transport::Buffer::Slot;
use xapp_frame::Transport::Structs::{MessageMeta, MEID_LEN, XACTION_LEN};

#[test]
fn test_message_meta_layout() {
    let raw = 8 + 8 + 4 + 4 + 4 + 4 + 4 + 4 + XACTION_LEN + MEID_LEN;
    let aligned = (raw + 7) & !7;

    let size = size_of::<MessageMeta>();
    let align = align_of::<MessageMeta>();
    let off_message_id = offset_of!(MessageMeta, message_id);
    let off_timestamp_ns = offset_of!(MessageMeta, timestamp_ns);
    let off_src_endpoint = offset_of!(MessageMeta, src_endpoint);
    let off_mtype = offset_of!(MessageMeta, mtype);
    let off_sub_id = offset_of!(MessageMeta, sub_id);
    let off_sender_pid = offset_of!(MessageMeta, sender_pid);
    let off_flags = offset_of!(MessageMeta, flags);
    let off_payload_len = offset_of!(MessageMeta, payload_len);
    let off_xaction = offset_of!(MessageMeta, xaction);
    let off_meid = offset_of!(MessageMeta, meid);

    println!(
        "MessageMeta => size: {size}, expected: {aligned}, align: {align}, offsets: [message_id:{off_message_id}, timestamp_ns:{off_timestamp_ns}, src_endpoint:{off_src_endpoint}, mtype:{off_mtype}, sub_id:{off_sub_id}, sender_pid:{off_sender_pid}, flags:{off_flags}, payload_len:{off_payload_len}, xaction:{off_xaction}, meid:{off_meid}]"
    );

    assert_eq!(size, aligned);
    assert_eq!(size, 104);
    assert_eq!(align, align_of::<u64>());
    assert_eq!(off_message_id, 0);
    assert_eq!(off_timestamp_ns, 8);
    assert_eq!(off_src_endpoint, 16);
    assert_eq!(off_mtype, 20);
    assert_eq!(off_sub_id, 24);
    assert_eq!(off_sender_pid, 28);
    assert_eq!(off_flags, 32);
    assert_eq!(off_payload_len, 36);
    assert_eq!(off_xaction, 40);
    assert_eq!(off_meid, 72);
}

#[test]
fn test_control_block_alignment() {
    assert_eq!(align_of::<ChannelEntry>(), 128);
    assert_eq!(size_of::<ChannelEntry>() % 128, 0);
    assert_eq!(align_of::<GlobalHeader>(), 128);
    assert!(size_of::<GlobalHeader>() >= MAX_CHANNELS * size_of::<ChannelEntry>());
    assert_eq!(offset_of!(GlobalHeader, magic), 0);
}

#[test]
fn test_slot_stride_is_cache_aligned() {
    assert_eq!(align_of::<Slot>(), 64);
    assert_eq!(size_of::<Slot>() % 64, 0);
}

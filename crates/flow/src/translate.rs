//! crates/flow/src/translate.rs
//!
//! Turns one decoded snapshot entry into the destination commands that
//! recreate it, per the translation table in §4.8.

use rdb::{RdbEntry, RdbValue};

/// One destination command: a name plus its argument list.
pub type Command = (&'static str, Vec<Vec<u8>>);

/// Expands `entry` into the commands that reproduce it on the destination,
/// in submission order. The caller is responsible for an `EXISTS` check
/// ahead of this, per the configured conflict policy — this function always
/// produces the write commands for `entry` unconditionally.
#[must_use]
pub fn translate(entry: &RdbEntry, now_ms: u64) -> Vec<Command> {
    let mut commands = Vec::new();
    match &entry.value {
        RdbValue::String(value) => {
            commands.push(("SET", vec![entry.key.clone(), value.clone()]));
        }
        RdbValue::Hash(fields) => {
            commands.push(("DEL", vec![entry.key.clone()]));
            if !fields.is_empty() {
                let mut args = Vec::with_capacity(1 + fields.len() * 2);
                args.push(entry.key.clone());
                for (field, value) in fields {
                    args.push(field.clone());
                    args.push(value.clone());
                }
                commands.push(("HSET", args));
            }
        }
        RdbValue::List(elements) => {
            commands.push(("DEL", vec![entry.key.clone()]));
            if !elements.is_empty() {
                let mut args = Vec::with_capacity(1 + elements.len());
                args.push(entry.key.clone());
                args.extend(elements.iter().cloned());
                commands.push(("RPUSH", args));
            }
        }
        RdbValue::Set(members) => {
            commands.push(("DEL", vec![entry.key.clone()]));
            if !members.is_empty() {
                let mut args = Vec::with_capacity(1 + members.len());
                args.push(entry.key.clone());
                args.extend(members.iter().cloned());
                commands.push(("SADD", args));
            }
        }
        RdbValue::SortedSet(members) => {
            commands.push(("DEL", vec![entry.key.clone()]));
            if !members.is_empty() {
                let mut args = Vec::with_capacity(1 + members.len() * 2);
                args.push(entry.key.clone());
                for (member, score) in members {
                    args.push(format_score(*score));
                    args.push(member.clone());
                }
                commands.push(("ZADD", args));
            }
        }
        RdbValue::Stream(messages) => {
            commands.push(("DEL", vec![entry.key.clone()]));
            for message in messages {
                let id = format!("{}-{}", message.id_ms, message.id_seq);
                let mut args = Vec::with_capacity(2 + message.fields.len() * 2);
                args.push(entry.key.clone());
                args.push(id.into_bytes());
                for (field, value) in &message.fields {
                    args.push(field.clone());
                    args.push(value.clone());
                }
                commands.push(("XADD", args));
            }
        }
    }

    if entry.expire_at_ms > now_ms {
        let remaining = entry.expire_at_ms - now_ms;
        commands.push((
            "PEXPIRE",
            vec![entry.key.clone(), remaining.to_string().into_bytes()],
        ));
    }

    commands
}

fn format_score(score: f64) -> Vec<u8> {
    if score == score.trunc() && score.is_finite() {
        format!("{score:.0}").into_bytes()
    } else {
        score.to_string().into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdb::StreamMessage;

    fn entry(value: RdbValue, expire_at_ms: u64) -> RdbEntry {
        RdbEntry {
            key: b"k".to_vec(),
            value,
            expire_at_ms,
            db_index: 0,
        }
    }

    #[test]
    fn string_entry_becomes_a_single_set() {
        let e = entry(RdbValue::String(b"v".to_vec()), 0);
        let commands = translate(&e, 1000);
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].0, "SET");
        assert_eq!(commands[0].1, vec![b"k".to_vec(), b"v".to_vec()]);
    }

    #[test]
    fn hash_entry_deletes_then_hsets() {
        let e = entry(RdbValue::Hash(vec![(b"f".to_vec(), b"v".to_vec())]), 0);
        let commands = translate(&e, 1000);
        assert_eq!(commands[0].0, "DEL");
        assert_eq!(commands[1].0, "HSET");
        assert_eq!(commands[1].1, vec![b"k".to_vec(), b"f".to_vec(), b"v".to_vec()]);
    }

    #[test]
    fn empty_containers_skip_the_populate_command() {
        let e = entry(RdbValue::Set(vec![]), 0);
        let commands = translate(&e, 1000);
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].0, "DEL");
    }

    #[test]
    fn future_expiration_appends_pexpire() {
        let e = entry(RdbValue::String(b"v".to_vec()), 5000);
        let commands = translate(&e, 1000);
        assert_eq!(commands.last().unwrap().0, "PEXPIRE");
        assert_eq!(commands.last().unwrap().1[1], b"4000".to_vec());
    }

    #[test]
    fn past_expiration_is_not_translated_here() {
        // Expired entries are dropped upstream (§4.7), but translate() does
        // not itself special-case them; `now_ms >= expire_at_ms` just
        // suppresses the trailing PEXPIRE.
        let e = entry(RdbValue::String(b"v".to_vec()), 500);
        let commands = translate(&e, 1000);
        assert_eq!(commands.len(), 1);
    }

    #[test]
    fn stream_entry_emits_one_xadd_per_message() {
        let e = entry(
            RdbValue::Stream(vec![StreamMessage {
                id_ms: 1,
                id_seq: 0,
                fields: vec![(b"a".to_vec(), b"1".to_vec())],
            }]),
            0,
        );
        let commands = translate(&e, 1000);
        assert_eq!(commands[0].0, "DEL");
        assert_eq!(commands[1].0, "XADD");
        assert_eq!(commands[1].1[1], b"1-0".to_vec());
    }

    #[test]
    fn sorted_set_score_is_formatted_without_trailing_zeros_when_integral() {
        let e = entry(RdbValue::SortedSet(vec![(b"m".to_vec(), 3.0)]), 0);
        let commands = translate(&e, 1000);
        assert_eq!(commands[1].1, vec![b"k".to_vec(), b"3".to_vec(), b"m".to_vec()]);
    }
}

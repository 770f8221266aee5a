//! Fuzz target: `SmtpSession::deliver`
//!
//! Plays arbitrary bytes back as the relay's side of the dialogue and
//! asserts the client never panics and never reports delivery unless the
//! relay sent a `354` somewhere.
//!
//! cargo fuzz run fuzz_smtp_reply

#![no_main]

use std::io::{Cursor, Read, Write};

use libfuzzer_sys::fuzz_target;
use tam110::adapters::smtp::SmtpSession;
use tam110::app::ports::OutboundMail;
use tam110::config::MailConfig;

struct Relay<'a>(Cursor<&'a [u8]>);

impl Read for Relay<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.0.read(buf)
    }
}

impl Write for Relay<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fuzz_target!(|data: &[u8]| {
    let mail = OutboundMail::from_config(&MailConfig::default());
    let mut session = SmtpSession::new(Relay(Cursor::new(data)));
    if session.deliver("user", "pass", &mail).is_ok() {
        assert!(data.windows(3).any(|w| w == b"354"));
    }
});

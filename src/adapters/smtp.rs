//! SMTP mailer adapter.
//!
//! Implements [`MailPort`] with a minimal implicit-TLS submission client:
//! one connection, one message, `AUTH LOGIN`.  The dialogue itself
//! ([`SmtpSession`]) is generic over `std::io::Read + Write`, so it runs the
//! same over the ESP-TLS stream on target and over a scripted buffer in tests.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::tls::EspTls` client with the
//!   certificate bundle.
//! - **all other targets**: no network; connecting fails with
//!   [`MailError::Connect`] unless a [`Connector`] is injected.
//!
//! ## Dialogue
//!
//! ```text
//!   S: 220            C: EHLO        S: 250
//!   C: AUTH LOGIN     S: 334  (user) S: 334  (pass) S: 235
//!   C: MAIL FROM      S: 250  C: RCPT TO  S: 250
//!   C: DATA           S: 354  (headers, body, CRLF.CRLF)  S: 250
//!   C: QUIT           S: 221
//! ```

use std::io::{BufRead, BufReader, Read, Write};

use data_encoding::BASE64;
use log::{debug, info, warn};

use crate::app::ports::{MailPort, OutboundMail};
use crate::config::MailConfig;
use crate::error::{MailError, SmtpStage};

use super::utils::has_line_break;

/// Domain announced in EHLO; the relay only needs it to be syntactically valid.
const EHLO_DOMAIN: &str = "[127.0.0.1]";
/// Upper bound on reply lines (EHLO capability lists are the longest).
const MAX_REPLY_LINES: usize = 32;

// ───────────────────────────────────────────────────────────────
// Dialogue
// ───────────────────────────────────────────────────────────────

pub struct SmtpSession<S: Read + Write> {
    stream: BufReader<S>,
    line: String,
}

impl<S: Read + Write> SmtpSession<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream: BufReader::new(stream),
            line: String::new(),
        }
    }

    pub fn into_inner(self) -> S {
        self.stream.into_inner()
    }

    /// Run the whole dialogue for a single message.
    pub fn deliver(
        &mut self,
        account: &str,
        password: &str,
        mail: &OutboundMail,
    ) -> Result<(), MailError> {
        self.expect(SmtpStage::Greeting, 220)?;
        self.command(SmtpStage::Ehlo, &format!("EHLO {EHLO_DOMAIN}"), 250)?;

        self.command(SmtpStage::Auth, "AUTH LOGIN", 334)?;
        self.command(SmtpStage::Auth, &BASE64.encode(account.as_bytes()), 334)?;
        self.command(SmtpStage::Auth, &BASE64.encode(password.as_bytes()), 235)?;

        self.command(SmtpStage::MailFrom, &format!("MAIL FROM:<{}>", mail.sender), 250)?;
        self.command(SmtpStage::RcptTo, &format!("RCPT TO:<{}>", mail.recipient), 250)?;
        self.command(SmtpStage::Data, "DATA", 354)?;

        let message = render_message(mail);
        self.send(SmtpStage::Body, &message)?;
        self.expect(SmtpStage::Body, 250)?;

        // The message is accepted at this point; a sloppy QUIT is not a failure.
        if let Err(e) = self.command(SmtpStage::Quit, "QUIT", 221) {
            debug!("SMTP: QUIT not acknowledged ({})", e);
        }
        Ok(())
    }

    fn command(&mut self, stage: SmtpStage, line: &str, expected: u16) -> Result<(), MailError> {
        self.send(stage, line)?;
        self.send(stage, "\r\n")?;
        self.expect(stage, expected)
    }

    fn send(&mut self, stage: SmtpStage, data: &str) -> Result<(), MailError> {
        let stream = self.stream.get_mut();
        stream
            .write_all(data.as_bytes())
            .and_then(|()| stream.flush())
            .map_err(|_| MailError::Io(stage))
    }

    /// Read one (possibly multi-line) reply and check its code.
    fn expect(&mut self, stage: SmtpStage, expected: u16) -> Result<(), MailError> {
        let code = self.read_reply(stage)?;
        if code == expected {
            Ok(())
        } else {
            Err(MailError::Rejected { stage, code })
        }
    }

    fn read_reply(&mut self, stage: SmtpStage) -> Result<u16, MailError> {
        for _ in 0..MAX_REPLY_LINES {
            self.line.clear();
            let n = self
                .stream
                .read_line(&mut self.line)
                .map_err(|_| MailError::Io(stage))?;
            if n == 0 {
                return Err(MailError::Io(stage));
            }
            let line = self.line.trim_end_matches(['\r', '\n']);
            let (code, last) = parse_reply_line(line).ok_or(MailError::Malformed(stage))?;
            if last {
                return Ok(code);
            }
        }
        Err(MailError::Malformed(stage))
    }
}

/// `"250-SIZE 35882577"` → `(250, false)`, `"250 OK"` / `"250"` → `(250, true)`.
fn parse_reply_line(line: &str) -> Option<(u16, bool)> {
    let code = line.get(..3)?;
    if !code.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let last = match line.as_bytes().get(3) {
        None | Some(b' ') => true,
        Some(b'-') => false,
        Some(_) => return None,
    };
    Some((code.parse().ok()?, last))
}

/// Headers plus dot-stuffed body, terminated by `CRLF.CRLF`.
fn render_message(mail: &OutboundMail) -> String {
    let mut out = String::with_capacity(256 + mail.body.len());
    out.push_str(&format!("From: \"{}\" <{}>\r\n", mail.sender_name, mail.sender));
    out.push_str(&format!("To: <{}>\r\n", mail.recipient));
    out.push_str(&format!("Subject: {}\r\n", mail.subject));
    out.push_str("MIME-Version: 1.0\r\n");
    out.push_str("Content-Type: text/plain; charset=utf-8\r\n");
    if mail.high_priority {
        out.push_str("X-Priority: 1\r\nImportance: high\r\n");
    }
    out.push_str("\r\n");
    for line in mail.body.lines() {
        if line.starts_with('.') {
            out.push('.');
        }
        out.push_str(line);
        out.push_str("\r\n");
    }
    out.push_str(".\r\n");
    out
}

// ───────────────────────────────────────────────────────────────
// Transport
// ───────────────────────────────────────────────────────────────

/// Opens the secure stream to the relay.
pub trait Connector {
    type Stream: Read + Write;

    fn connect(&mut self, host: &str, port: u16) -> Result<Self::Stream, MailError>;
}

impl<C: Connector + ?Sized> Connector for &mut C {
    type Stream = C::Stream;

    fn connect(&mut self, host: &str, port: u16) -> Result<Self::Stream, MailError> {
        (**self).connect(host, port)
    }
}

/// Platform TLS connector.
pub struct TlsConnector;

#[cfg(target_os = "espidf")]
pub struct TlsStream(esp_idf_svc::tls::EspTls<esp_idf_svc::tls::InternalSocket>);

#[cfg(target_os = "espidf")]
impl Read for TlsStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.0.read(buf).map_err(std::io::Error::other)
    }
}

#[cfg(target_os = "espidf")]
impl Write for TlsStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.write(buf).map_err(std::io::Error::other)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(target_os = "espidf")]
impl Connector for TlsConnector {
    type Stream = TlsStream;

    fn connect(&mut self, host: &str, port: u16) -> Result<TlsStream, MailError> {
        use esp_idf_svc::tls::{Config, EspTls};

        let mut tls = EspTls::new().map_err(|e| {
            warn!("SMTP(espidf): TLS context allocation failed ({})", e);
            MailError::Connect
        })?;
        let config = Config {
            common_name: Some(host),
            use_crt_bundle_attach: true,
            ..Default::default()
        };
        tls.connect(host, port, &config).map_err(|e| {
            warn!("SMTP(espidf): connect to {}:{} failed ({})", host, port, e);
            MailError::Connect
        })?;
        Ok(TlsStream(tls))
    }
}

#[cfg(not(target_os = "espidf"))]
impl Connector for TlsConnector {
    type Stream = std::io::Empty;

    fn connect(&mut self, host: &str, port: u16) -> Result<std::io::Empty, MailError> {
        warn!("SMTP(sim): no network, not connecting to {}:{}", host, port);
        Err(MailError::Connect)
    }
}

// ───────────────────────────────────────────────────────────────
// Mailer
// ───────────────────────────────────────────────────────────────

pub struct SmtpMailer<C: Connector = TlsConnector> {
    host: heapless::String<64>,
    port: u16,
    account: heapless::String<64>,
    password: heapless::String<64>,
    connector: C,
}

impl SmtpMailer<TlsConnector> {
    pub fn new(config: &MailConfig) -> Self {
        Self::with_connector(config, TlsConnector)
    }
}

impl<C: Connector> SmtpMailer<C> {
    pub fn with_connector(config: &MailConfig, connector: C) -> Self {
        Self {
            host: config.smtp_host.clone(),
            port: config.smtp_port,
            account: config.account.clone(),
            password: config.password.clone(),
            connector,
        }
    }
}

impl<C: Connector> MailPort for SmtpMailer<C> {
    fn send(&mut self, mail: &OutboundMail) -> Result<(), MailError> {
        let headers = [
            mail.sender_name.as_str(),
            mail.sender.as_str(),
            mail.recipient.as_str(),
            mail.subject.as_str(),
        ];
        if headers.iter().any(|h| has_line_break(h)) {
            return Err(MailError::InvalidHeader);
        }

        info!("SMTP: connecting to {}:{}", self.host, self.port);
        let stream = self.connector.connect(&self.host, self.port)?;
        let mut session = SmtpSession::new(stream);
        session.deliver(&self.account, &self.password, mail)?;
        info!("SMTP: message to <{}> accepted", mail.recipient);
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────

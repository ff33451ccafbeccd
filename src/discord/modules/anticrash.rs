// Crash reporting to Discord.
//
// Reports are built by the core service and posted to every configured id.
// An id is tried as a channel first and as a user (DM) second. A panic hook
// forwards panics through a channel to an async task that does the posting.

use super::ModuleContext;
use crate::core::anticrash::{AnticrashService, CrashReport, CrashSource, ReportBody};
use crate::core::modules::{BotModule, ModuleError};
use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use std::sync::{Arc, Mutex, OnceLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const REPORT_COLOR: u32 = 0xFF0000;

struct PanicForwarder {
    reporter: JoinHandle<()>,
    restore_hook: Box<dyn FnOnce() + Send>,
}

pub struct AnticrashModule {
    service: Arc<AnticrashService>,
    http: OnceLock<Arc<serenity::Http>>,
    panic_forwarder: Mutex<Option<PanicForwarder>>,
}

impl AnticrashModule {
    pub fn new(report_channels: Vec<u64>) -> Self {
        Self {
            service: Arc::new(AnticrashService::new(report_channels)),
            http: OnceLock::new(),
            panic_forwarder: Mutex::new(None),
        }
    }

    pub fn service(&self) -> &AnticrashService {
        &self.service
    }

    /// Log and post a crash report. Returns the ids of the messages sent.
    pub async fn report(
        &self,
        source: CrashSource,
        summary: &str,
        detail: &str,
    ) -> Vec<serenity::MessageId> {
        let report = self.service.build_report(source, summary, detail);
        match self.http.get() {
            Some(http) => send_report(http, self.service.report_channels(), &report).await,
            None => {
                log_report(&report);
                Vec::new()
            }
        }
    }

    fn install_panic_hook(&self, http: Arc<serenity::Http>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<(String, String)>();

        let service = Arc::clone(&self.service);
        let reporter = tokio::spawn(async move {
            while let Some((summary, detail)) = rx.recv().await {
                let report = service.build_report(CrashSource::Panic, &summary, &detail);
                send_report(&http, service.report_channels(), &report).await;
            }
        });

        let previous = Arc::new(std::panic::take_hook());
        let chained = Arc::clone(&previous);
        std::panic::set_hook(Box::new(move |info| {
            let payload = info.payload();
            let summary = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "Box<dyn Any>".to_string());
            let location = info
                .location()
                .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
                .unwrap_or_else(|| "unknown location".to_string());

            let _ = tx.send((summary.clone(), format!("panicked at {location}:\n{summary}")));
            chained(info);
        }));

        let restore_hook: Box<dyn FnOnce() + Send> = Box::new(move || {
            std::panic::set_hook(Box::new(move |info| previous(info)));
        });

        let mut slot = match self.panic_forwarder.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = Some(PanicForwarder {
            reporter,
            restore_hook,
        });
    }

    fn remove_panic_hook(&self) {
        let forwarder = match self.panic_forwarder.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        if let Some(forwarder) = forwarder {
            (forwarder.restore_hook)();
            forwarder.reporter.abort();
        }
    }
}

#[async_trait]
impl BotModule<ModuleContext> for AnticrashModule {
    fn id(&self) -> &'static str {
        "anticrash"
    }

    async fn start(&self, _ctx: &ModuleContext) -> Result<bool, ModuleError> {
        if self.service.report_channels().is_empty() {
            tracing::warn!("No anticrash report channels configured; crashes will only be logged");
        }
        Ok(true)
    }

    async fn load(&self, ctx: &ModuleContext) -> Result<(), ModuleError> {
        let _ = self.http.set(Arc::clone(&ctx.http));
        self.install_panic_hook(Arc::clone(&ctx.http));
        tracing::info!(
            targets = self.service.report_channels().len(),
            "Anticrash reporter ready"
        );
        Ok(())
    }

    async fn unload(&self, _ctx: &ModuleContext) -> Result<(), ModuleError> {
        self.remove_panic_hook();
        Ok(())
    }
}

fn log_report(report: &CrashReport) {
    tracing::error!(source = %report.source, title = %report.title, "Anticrash report");
}

pub fn build_message(report: &CrashReport) -> serenity::CreateMessage {
    let mut embed = serenity::CreateEmbed::new()
        .author(serenity::CreateEmbedAuthor::new(&report.author))
        .title(&report.title)
        .color(REPORT_COLOR)
        .footer(serenity::CreateEmbedFooter::new(report.source.to_string()));

    if let Ok(timestamp) = serenity::Timestamp::from_unix_timestamp(report.created_at.timestamp()) {
        embed = embed.timestamp(timestamp);
    }

    match &report.body {
        ReportBody::Inline(text) => serenity::CreateMessage::new().embed(embed.description(text)),
        ReportBody::Attachment { filename, contents } => serenity::CreateMessage::new()
            .embed(embed.description(format!("Full report attached as `{filename}`")))
            .add_file(serenity::CreateAttachment::bytes(contents.clone(), filename.clone())),
    }
}

async fn send_report(
    http: &serenity::Http,
    targets: &[u64],
    report: &CrashReport,
) -> Vec<serenity::MessageId> {
    log_report(report);

    let mut sent = Vec::new();
    for &target in targets {
        match deliver(http, target, report).await {
            Some(id) => sent.push(id),
            None => tracing::warn!(target, "Failed to deliver anticrash report"),
        }
    }
    sent
}

async fn deliver(
    http: &serenity::Http,
    target: u64,
    report: &CrashReport,
) -> Option<serenity::MessageId> {
    match serenity::ChannelId::new(target)
        .send_message(http, build_message(report))
        .await
    {
        Ok(message) => return Some(message.id),
        Err(e) => tracing::debug!(target, error = %e, "Report target is not a usable channel"),
    }

    let dm = match serenity::UserId::new(target).create_dm_channel(http).await {
        Ok(dm) => dm,
        Err(e) => {
            tracing::debug!(target, error = %e, "Report target is not a reachable user");
            return None;
        }
    };

    dm.id
        .send_message(http, build_message(report))
        .await
        .map(|message| message.id)
        .ok()
}

//! One pass over unread notification mail: parse, judge, reply, record, report.

pub mod summary;

pub use summary::{PostedReply, RunFailure, RunReport};

use chrono::Local;
use database::{Database, ProcessedRecord};
use gmail_client::{MailSender, Mailbox};
use llm_interface::Oracle;
use notification_parser::NotificationParser;
use reddit_client::Gateway;
use replybot_core::{CoreError, ErrorExt, ParsedReference, SummaryConfig};
use tracing::{debug, error, info, info_span, warn, Instrument};


pub const DRY_RUN_REASON: &str = "Dry run - Reddit not authenticated";

/// Where a single message ended up before its ledger write.
enum Outcome {
    Unparseable,
    Judged {
        reference: ParsedReference,
        record: ProcessedRecord,
    },
}

pub struct Orchestrator<M, O, G> {
    mailbox: M,
    oracle: O,
    gateway: Option<G>,
    ledger: Database,
    parser: NotificationParser,
    query: String,
    summary: SummaryConfig,
}

impl<M, O, G> Orchestrator<M, O, G>
where
    M: Mailbox + MailSender,
    O: Oracle,
    G: Gateway,
{
    /// Without a `gateway` the run is a dry run: relevant items are drafted but never posted.
    pub fn new(
        mailbox: M,
        oracle: O,
        gateway: Option<G>,
        ledger: Database,
        query: String,
        summary: SummaryConfig,
    ) -> Self {
        Self {
            mailbox,
            oracle,
            gateway,
            ledger,
            parser: NotificationParser::new(),
            query,
            summary,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.gateway.is_none()
    }

    pub fn ledger(&self) -> &Database {
        &self.ledger
    }

    pub fn into_ledger(self) -> Database {
        self.ledger
    }

    /// Process every unread notification once and send the summary.
    ///
    /// Only a failure to list the mailbox aborts the run; everything after that is captured in
    /// the report.
    pub async fn run(&self) -> Result<RunReport, CoreError> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = info_span!("run", run_id = %run_id);

        async {
            let mut report = RunReport::new(run_id.clone(), Local::now());
            if self.is_dry_run() {
                warn!("Reddit posting unavailable, running in dry-run mode");
            }

            info!("Fetching emails with query: {}", self.query);
            let message_ids = self.mailbox.list_unread(&self.query).await.map_err(|e| {
                e.log_error();
                e
            })?;
            info!("Found {} unread emails", message_ids.len());

            for message_id in &message_ids {
                self.process_message(message_id, &mut report).await;
            }

            report.lifetime = match self.ledger.get_stats().await {
                Ok(stats) => stats,
                Err(e) => {
                    e.log_warn();
                    Default::default()
                }
            };

            info!(
                "Run complete: processed {}, relevant {}, posted {}, errors {}",
                report.processed,
                report.relevant,
                report.posted,
                report.errors()
            );
            info!(
                "All-time: processed {}, relevant {}, posted {}",
                report.lifetime.total_processed,
                report.lifetime.relevant,
                report.lifetime.responses_posted
            );

            self.send_summary(&report).await;
            Ok::<_, CoreError>(report)
        }
        .instrument(span)
        .await
    }

    async fn process_message(&self, message_id: &str, report: &mut RunReport) {
        match self.ledger.is_processed(message_id).await {
            Ok(true) => {
                debug!("Skipping already processed email: {}", message_id);
                return;
            }
            Ok(false) => {}
            Err(e) => {
                e.log_error();
                report.failures.push(RunFailure {
                    message_id: message_id.to_string(),
                    url: None,
                    error: format!("ledger lookup failed: {}", e),
                });
                return;
            }
        }

        let message = match self.mailbox.fetch_message(message_id).await {
            Ok(message) => message,
            Err(e) => {
                e.log_error();
                report.failures.push(RunFailure {
                    message_id: message_id.to_string(),
                    url: None,
                    error: format!("could not fetch message: {}", e),
                });
                return;
            }
        };

        let record = match self.judge(message_id, &message.body, &message.subject, report).await {
            Outcome::Unparseable => ProcessedRecord::unparseable(message_id),
            Outcome::Judged { reference, record } => {
                debug!("Finished {} for {}", message_id, reference.url);
                record
            }
        };

        if let Err(e) = self.ledger.mark_processed(&record).await {
            e.log_error();
            report.failures.push(RunFailure {
                message_id: message_id.to_string(),
                url: (!record.reddit_url.is_empty()).then(|| record.reddit_url.clone()),
                error: format!("could not record outcome: {}", e),
            });
            return;
        }
        report.processed += 1;

        if let Err(e) = self.mailbox.mark_read(message_id).await {
            e.log_warn();
        }
    }

    async fn judge(
        &self,
        message_id: &str,
        body: &str,
        subject: &str,
        report: &mut RunReport,
    ) -> Outcome {
        let Some(reference) = self.parser.parse(body, subject) else {
            info!("Could not parse Reddit info from email: {}", message_id);
            return Outcome::Unparseable;
        };
        info!("Processing: {}", reference.url);

        let record = ProcessedRecord::for_reference(message_id, &reference);
        let fail = |report: &mut RunReport, error: String| {
            report.failures.push(RunFailure {
                message_id: message_id.to_string(),
                url: Some(reference.url.clone()),
                error,
            });
        };

        let verdict = match self.oracle.check_relevance(&reference.content).await {
            Ok(verdict) => verdict,
            Err(e) => {
                e.log_error();
                fail(report, format!("relevance check failed: {}", e));
                return Outcome::Judged { reference, record };
            }
        };
        info!("Relevance: {} - {}", verdict.relevant, verdict.explanation);
        if !verdict.relevant {
            return Outcome::Judged { reference, record };
        }

        report.relevant += 1;
        let record = record.relevant(true);

        let response = match self
            .oracle
            .generate_response(&reference.content, &reference.url)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                e.log_error();
                fail(report, format!("response generation failed: {}", e));
                return Outcome::Judged { reference, record };
            }
        };

        let Some(gateway) = &self.gateway else {
            info!("Dry run, not posting reply for {}", reference.url);
            fail(report, DRY_RUN_REASON.to_string());
            return Outcome::Judged { reference, record };
        };

        let posted = match &reference.comment_id {
            Some(comment_id) => gateway.post_reply(comment_id, &response).await,
            None => gateway.post_top_level(&reference.post_id, &response).await,
        };

        match posted {
            Ok(posted) => {
                info!("Posted successfully: {}", posted.comment_url);
                report.posted += 1;
                report.posted_replies.push(PostedReply {
                    original_url: reference.url.clone(),
                    comment_url: posted.comment_url.clone(),
                    preview: summary::preview(&response),
                });
                Outcome::Judged {
                    record: record.posted(posted.comment_url),
                    reference,
                }
            }
            Err(e) => {
                e.log_error();
                fail(report, e.to_string());
                Outcome::Judged { reference, record }
            }
        }
    }

    /// Send the summary mail. Failures are logged and otherwise ignored.
    pub async fn send_summary(&self, report: &RunReport) {
        if !self.summary.enabled {
            debug!("Summary mail disabled");
            return;
        }

        let email = summary::build_email(report, &self.summary);
        match self.mailbox.send_email(&email).await {
            Ok(_) => info!("Summary email sent"),
            Err(e) => error!("Failed to send summary email: {}", e),
        }
    }
}

#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Content messages: prompts, media staging and agent outcomes.

mod common;

use std::{sync::Arc, time::Duration};

use {
    common::{Harness, MAIN_KEY, MockRunner, RecordingSink, dm},
    parley_auto_reply::{ABORTED_NOTE, ABORTED_REPLY, Error, ReplyOptions},
    parley_common::{ChatType, InboundContext, InboundMedia, ThinkLevel},
    parley_config::{ParleyConfig, SandboxMode},
};

fn group_message(body: &str) -> InboundContext {
    let mut ctx = InboundContext::new(body, "group:g1");
    ctx.provider = Some("whatsapp".into());
    ctx.chat_type = ChatType::Group;
    ctx
}

fn photo(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let path = dir.path().join("photo.jpg");
    std::fs::write(&path, b"\xff\xd8\xff").unwrap();
    path
}

#[tokio::test]
async fn runs_agent_with_effective_settings() {
    let h = Harness::new(ParleyConfig::default());
    h.send("/model openai/gpt-5.2").await;
    h.send("/think medium").await;

    let replies = h.send("hello there").await;
    assert_eq!(replies, ["echo: hello there"]);

    let run = h.runner.last_run();
    let entry = h.entry(MAIN_KEY).await.unwrap();
    assert_eq!(run.session_id, entry.session_id);
    assert_eq!(run.session_key, MAIN_KEY);
    assert_eq!(run.provider, "openai");
    assert_eq!(run.model, "gpt-5.2");
    assert_eq!(run.thinking.as_str(), "medium");
    assert_eq!(run.timeout, Some(Duration::from_secs(600)));
    assert_eq!(
        run.transcript_path,
        h.state_dir()
            .join("agents/main/sessions")
            .join(format!("{}.jsonl", entry.session_id))
    );
}

#[tokio::test]
async fn empty_message_produces_no_reply() {
    let h = Harness::new(ParleyConfig::default());
    assert!(h.send("   ").await.is_empty());
    assert_eq!(h.runner.run_count(), 0);
}

#[tokio::test]
async fn unknown_slash_word_goes_to_agent() {
    let h = Harness::new(ParleyConfig::default());
    assert_eq!(h.send("/shrug fine").await, ["echo: /shrug fine"]);
}

#[tokio::test]
async fn inline_status_goes_to_block_sink_once() {
    let h = Harness::new(ParleyConfig::default());
    let sink = Arc::new(RecordingSink::default());
    let opts = ReplyOptions {
        block_reply: Some(sink.clone()),
    };

    let replies = h
        .dispatcher
        .get_reply(&dm("here we go /status now"), &opts)
        .await
        .unwrap();

    let texts: Vec<&str> = replies.iter().map(|p| p.text.as_str()).collect();
    assert_eq!(texts, ["echo: here we go now"]);
    let blocks = sink.payloads.lock().unwrap();
    assert_eq!(blocks.len(), 1);
    assert!(blocks[0].text.contains("Model:"));
    assert_eq!(h.runner.prompts(), ["here we go now"]);
}

#[tokio::test]
async fn inline_status_without_sink_leads_the_reply_set() {
    let h = Harness::new(ParleyConfig::default());
    let replies = h.send("/status then summarize").await;
    assert_eq!(replies.len(), 2);
    assert!(replies[0].starts_with("⚙️ Status"));
    assert_eq!(replies[1], "echo: then summarize");
}

#[tokio::test]
async fn aborted_run_note_is_sent_once() {
    let h = Harness::new(ParleyConfig::default());
    h.send("hi").await;
    h.send("/stop").await;
    assert!(h.entry(MAIN_KEY).await.unwrap().aborted_last_run);

    h.send("are you there?").await;
    assert_eq!(
        h.runner.last_run().prompt,
        format!("{ABORTED_NOTE}\n\nare you there?")
    );
    assert!(!h.entry(MAIN_KEY).await.unwrap().aborted_last_run);

    h.send("next").await;
    assert_eq!(h.runner.last_run().prompt, "next");
}

#[tokio::test]
async fn stop_during_a_run_survives_its_completion() {
    let h = Harness::with_runner(
        ParleyConfig::default(),
        MockRunner::with_delay(Duration::from_millis(50)),
    );
    h.send("hi").await;
    h.send("/stop").await;

    // The noted run clears the flag up front; a /stop while it runs sets it again.
    let (_, stopped) = tokio::join!(h.send("still there?"), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!h.entry(MAIN_KEY).await.unwrap().aborted_last_run);
        h.send("/stop").await
    });
    assert_eq!(stopped, [ABORTED_REPLY]);

    assert!(h.entry(MAIN_KEY).await.unwrap().aborted_last_run);
    h.send("again").await;
    assert_eq!(
        h.runner.last_run().prompt,
        format!("{ABORTED_NOTE}\n\nagain")
    );
}

#[tokio::test]
async fn directive_with_trailing_text_still_runs_the_agent() {
    let h = Harness::new(ParleyConfig::default());
    assert_eq!(h.send("/think high tell me a joke about rust").await, [
        "Thinking level set to high.",
        "echo: tell me a joke about rust",
    ]);
    assert_eq!(h.runner.run_count(), 1);
    let run = h.runner.last_run();
    assert_eq!(run.thinking, ThinkLevel::High);
    assert_eq!(run.prompt, "tell me a joke about rust");
}

#[tokio::test]
async fn model_directive_takes_one_token() {
    let h = Harness::new(ParleyConfig::default());
    assert_eq!(h.send("/model openai/gpt-5.2 and explain closures").await, [
        "Model set to openai/gpt-5.2.",
        "echo: and explain closures",
    ]);
    let entry = h.entry(MAIN_KEY).await.unwrap();
    assert_eq!(entry.provider_override.as_deref(), Some("openai"));
    assert_eq!(entry.model_override.as_deref(), Some("gpt-5.2"));
    let run = h.runner.last_run();
    assert_eq!((run.provider.as_str(), run.model.as_str()), ("openai", "gpt-5.2"));
}

#[tokio::test]
async fn media_is_staged_into_group_workspace() {
    let h = Harness::new(ParleyConfig::default());
    let downloads = tempfile::tempdir().unwrap();
    let source = photo(&downloads);
    let absolute = source.display().to_string();

    let mut ctx = group_message(&format!("what is in {absolute}?"));
    ctx.media.push(InboundMedia {
        path: source.clone(),
        mime_type: Some("image/jpeg".into()),
        url: None,
    });
    let replies = h.send_ctx(&ctx).await;
    assert_eq!(replies.len(), 1);

    let run = h.runner.last_run();
    assert_eq!(run.session_key, "agent:main:whatsapp:group:g1");
    assert!(run.prompt.contains("media/inbound/photo.jpg"));
    assert!(!run.prompt.contains(&absolute));
    assert!(run.prompt.starts_with("[media attached: media/inbound/photo.jpg (image/jpeg)]\n"));

    let workspace = run.workspace_dir.unwrap();
    assert!(workspace.starts_with(h.state_dir().join("sandboxes")));
    assert!(workspace.join("media/inbound/photo.jpg").is_file());
}

#[tokio::test]
async fn sandbox_off_references_original_path() {
    let mut config = ParleyConfig::default();
    config.agents.defaults.sandbox.mode = SandboxMode::Off;
    let h = Harness::new(config);
    let downloads = tempfile::tempdir().unwrap();
    let source = photo(&downloads);

    let mut ctx = dm("");
    ctx.media.push(InboundMedia {
        path: source.clone(),
        mime_type: None,
        url: None,
    });
    h.send_ctx(&ctx).await;

    let run = h.runner.last_run();
    assert_eq!(run.workspace_dir, None);
    assert_eq!(run.prompt, format!("[media attached: {}]\n", source.display()));
}

#[tokio::test]
async fn missing_attachment_is_an_error() {
    let h = Harness::new(ParleyConfig::default());
    let mut ctx = group_message("look");
    ctx.media.push(InboundMedia {
        path: h.state_dir().join("gone.png"),
        mime_type: None,
        url: None,
    });

    let err = h
        .dispatcher
        .get_reply(&ctx, &ReplyOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Media(_)));
    assert_eq!(h.runner.run_count(), 0);
}

#[tokio::test]
async fn agent_failure_becomes_error_reply() {
    let h = Harness::with_runner(ParleyConfig::default(), MockRunner::failing("boom"));
    let replies = h
        .dispatcher
        .get_reply(&dm("hi"), &ReplyOptions::default())
        .await
        .unwrap();
    assert_eq!(replies.len(), 1);
    assert!(replies[0].is_error);
    assert_eq!(replies[0].text, "⚠️ Agent failed before reply: boom");
}

#[tokio::test(start_paused = true)]
async fn agent_timeout_becomes_error_reply() {
    let mut config = ParleyConfig::default();
    config.agents.defaults.timeout_secs = 1;
    let h = Harness::with_runner(config, MockRunner::with_delay(Duration::from_secs(30)));

    assert_eq!(h.send("slow one").await, ["⚠️ Agent run timed out after 1s."]);
    assert_eq!(h.runner.aborted.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn replies_thread_to_inbound_message() {
    let h = Harness::new(ParleyConfig::default());
    let mut ctx = dm("hi");
    ctx.message_id = Some("m-42".into());
    let replies = h
        .dispatcher
        .get_reply(&ctx, &ReplyOptions::default())
        .await
        .unwrap();
    assert_eq!(replies[0].reply_to_id.as_deref(), Some("m-42"));
}

//! 翻译管道集成测试
//!
//! 测试从扫描、分批、调度到写回译文的端到端流程

use std::collections::HashSet;
use std::time::Duration;

use livetrans::document::MutationOrigin;
use livetrans::translation::pipeline::filters::RejectReason;

#[allow(dead_code)]
mod common {
    include!("common/mod.rs");
}

use common::{
    fake_translation, run_local, HtmlTestHelper, MockTranslator, TestConfigBuilder,
    TestEnvironment,
};

/// 首次翻译：插入译文节点并清空原文
#[tokio::test(start_paused = true)]
async fn test_first_translation_inserts_annotation() {
    let env = TestEnvironment::with_parts(
        "<p id=\"greeting\">Hello world</p>",
        TestConfigBuilder::new().build(),
        MockTranslator::new().with_fixed(&[("Hello world", "你好世界")]),
    );

    run_local(async {
        let session = env.session();
        assert!(session.start());
        session.wait_idle().await;
    })
    .await;

    let p = HtmlTestHelper::by_id(&env.root, "greeting").unwrap();
    let unit = HtmlTestHelper::first_child(&p);

    assert_eq!(env.translator.calls(), vec![vec!["Hello world".to_string()]]);
    assert_eq!(HtmlTestHelper::unit_text(&env.document, &unit), "");
    assert_eq!(
        HtmlTestHelper::annotation_after(&unit),
        Some("你好世界".to_string())
    );
    assert_eq!(env.cache.get("Hello world"), Some("你好世界".to_string()));
    assert!(env
        .html()
        .contains("<p id=\"greeting\"><font class=\"livetrans-trans-node\">你好世界</font></p>"));
}

/// 宿主重新填充原文后，从缓存重新应用且不调用后端
#[tokio::test(start_paused = true)]
async fn test_refilled_unit_is_reapplied_from_cache() {
    let env = TestEnvironment::with_parts(
        "<p id=\"greeting\">Hello world</p>",
        TestConfigBuilder::new().build(),
        MockTranslator::new().with_fixed(&[("Hello world", "你好世界")]),
    );
    let p = HtmlTestHelper::by_id(&env.root, "greeting").unwrap();
    let unit = HtmlTestHelper::first_child(&p);

    let stats = run_local(async {
        let session = env.session();
        session.start();
        session.wait_idle().await;

        env.document
            .set_text(&unit, "Hello world", MutationOrigin::Host)
            .unwrap();
        session.wait_idle().await;
        session.stats()
    })
    .await;

    assert_eq!(env.translator.call_count(), 1);
    assert_eq!(stats.cache_hits, 1);
    assert_eq!(HtmlTestHelper::unit_text(&env.document, &unit), "");
    assert_eq!(
        HtmlTestHelper::annotation_after(&unit),
        Some("你好世界".to_string())
    );
    assert_eq!(env.annotation_count(), 1);
}

/// 纯数字、过短文本和忽略容器内的文本不会进入管道
#[tokio::test(start_paused = true)]
async fn test_rejected_text_never_reaches_backend() {
    let env = TestEnvironment::new(
        "<p>42</p><p>a</p><script>var message = 1;</script>\
         <pre>let kept = true;</pre><p>Real sentence</p>",
    );

    let scan_stats = run_local(async {
        let session = env.session();
        session.start();
        session.wait_idle().await;
        session.scan_stats()
    })
    .await;

    assert_eq!(env.translator.texts_sent(), vec!["Real sentence".to_string()]);
    assert_eq!(scan_stats.rejected_for(RejectReason::Numeric), 1);
    assert!(scan_stats.rejected_for(RejectReason::TooShort) >= 1);
    assert_eq!(scan_stats.rejected_for(RejectReason::IgnoredContainer), 2);

    let html = env.html();
    assert!(html.contains("<p>42</p>"));
    assert!(html.contains("<p>a</p>"));
    assert!(html.contains("var message = 1;"));
}

/// 已经带有译文的单元不会被再次发送
#[tokio::test(start_paused = true)]
async fn test_existing_annotation_is_respected() {
    let env = TestEnvironment::new(
        "<p id=\"done\"><font class=\"livetrans-trans-node\">已经翻译</font></p>",
    );
    let p = HtmlTestHelper::by_id(&env.root, "done").unwrap();
    let annotation = HtmlTestHelper::first_child(&p);

    // 原文已被清空的单元
    let emptied = env.document.create_text("");
    env.document
        .append_child(&p, &emptied, MutationOrigin::Host);
    env.document
        .append_child(&p, &annotation, MutationOrigin::Host);

    run_local(async {
        let session = env.session();
        session.start();
        session.wait_idle().await;
    })
    .await;

    assert_eq!(env.translator.call_count(), 0);
    assert_eq!(env.annotation_count(), 1);
}

/// 启动是幂等的
#[tokio::test(start_paused = true)]
async fn test_start_is_idempotent() {
    let env = TestEnvironment::new("<p>Hello world</p>");

    run_local(async {
        let session = env.session();
        assert!(session.start());
        assert!(!session.start());
        assert!(session.is_active());
        session.wait_idle().await;

        // 重新扫描也不会产生重复的译文
        assert_eq!(session.rescan(), 0);
        session.wait_idle().await;
    })
    .await;

    assert_eq!(env.translator.call_count(), 1);
    assert_eq!(env.annotation_count(), 1);
}

/// 相同文本在一次处理中只发送一次，结果扇出到所有单元
#[tokio::test(start_paused = true)]
async fn test_duplicate_texts_are_sent_once() {
    let env = TestEnvironment::new(
        "<p id=\"a\">Same text</p><p id=\"b\">Same text</p><p id=\"c\">Other text</p>",
    );

    run_local(async {
        let session = env.session();
        session.start();
        session.wait_idle().await;
    })
    .await;

    let sent = env.translator.texts_sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(
        sent.iter().filter(|text| text.as_str() == "Same text").count(),
        1
    );

    for id in ["a", "b"] {
        let p = HtmlTestHelper::by_id(&env.root, id).unwrap();
        let unit = HtmlTestHelper::first_child(&p);
        assert_eq!(
            HtmlTestHelper::annotation_after(&unit),
            Some(fake_translation("Same text"))
        );
    }
}

/// 每个批次的字符数不超过预算，超长文本单独成批
#[tokio::test(start_paused = true)]
async fn test_batches_respect_char_budget() {
    let env = TestEnvironment::with_parts(
        "<p>alpha one</p><p>beta two</p><p>gamma three</p>\
         <p>a paragraph that is much longer than the budget</p><p>delta</p>",
        TestConfigBuilder::new().batch_char_limit(20).build(),
        MockTranslator::new(),
    );

    run_local(async {
        let session = env.session();
        session.start();
        session.wait_idle().await;
    })
    .await;

    let calls = env.translator.calls();
    assert!(calls.len() >= 3);
    for call in &calls {
        let chars: usize = call.iter().map(|text| text.chars().count()).sum();
        assert!(
            chars <= 20 || call.len() == 1,
            "batch {:?} exceeds the budget",
            call
        );
    }

    let sent: HashSet<String> = env.translator.texts_sent().into_iter().collect();
    assert_eq!(sent.len(), 5);
    assert_eq!(env.annotation_count(), 5);
}

/// 同时在途的后端调用不超过并发上限
#[tokio::test(start_paused = true)]
async fn test_concurrency_ceiling() {
    let html: String = (0..12)
        .map(|i| format!("<p>Paragraph number {}</p>", i))
        .collect();
    let env = TestEnvironment::with_parts(
        &html,
        TestConfigBuilder::new()
            .batch_char_limit(10)
            .max_concurrent(3)
            .build(),
        MockTranslator::new().with_delay(Duration::from_millis(50)),
    );

    let dispatch = run_local(async {
        let session = env.session();
        session.start();
        session.wait_idle().await;
        session.dispatch_stats().unwrap()
    })
    .await;

    assert_eq!(env.translator.call_count(), 12);
    assert!(env.translator.peak_in_flight() <= 3);
    assert!(env.translator.peak_in_flight() >= 2);
    assert!(dispatch.peak_active <= 3);
    assert_eq!(dispatch.active, 0);
    assert_eq!(env.annotation_count(), 12);
}

/// 缓存在会话之间共享：已解析过的文本不再调用后端
#[tokio::test(start_paused = true)]
async fn test_cache_shared_between_documents() {
    let first = TestEnvironment::new("<p>Shared sentence</p>");
    run_local(async {
        let session = first.session();
        session.start();
        session.wait_idle().await;
    })
    .await;

    let mut second = TestEnvironment::new("<div><span>Shared sentence</span></div>");
    second.cache = first.cache.clone();

    let stats = run_local(async {
        let session = second.session();
        session.start();
        session.wait_idle().await;
        session.stats()
    })
    .await;

    assert_eq!(second.translator.call_count(), 0);
    assert_eq!(stats.cache_hits, 1);
    assert_eq!(second.annotation_count(), 1);
}

/// 宿主插入的新内容会被观察并翻译
#[tokio::test(start_paused = true)]
async fn test_inserted_content_is_translated() {
    let env = TestEnvironment::new("<p>Initial text</p><div id=\"feed\"></div>");
    let feed = HtmlTestHelper::by_id(&env.root, "feed").unwrap();

    let late = run_local(async {
        let session = env.session();
        session.start();
        session.wait_idle().await;

        let item = env.document.create_element("p", &[]);
        let text = env.document.create_text("Late arrival");
        env.document.append_child(&item, &text, MutationOrigin::Host);
        env.document.append_child(&feed, &item, MutationOrigin::Host);

        session.wait_idle().await;
        text
    })
    .await;

    assert_eq!(env.translator.call_count(), 2);
    assert_eq!(
        HtmlTestHelper::annotation_after(&late),
        Some(fake_translation("Late arrival"))
    );
}

/// 静默期内的多次修改合并为一次处理
#[tokio::test(start_paused = true)]
async fn test_bursts_are_debounced() {
    let env = TestEnvironment::new("<p>Initial text</p><div id=\"feed\"></div>");
    let feed = HtmlTestHelper::by_id(&env.root, "feed").unwrap();

    let stats = run_local(async {
        let session = env.session();
        session.start();
        session.wait_idle().await;

        for i in 0..5 {
            let item = env.document.create_element("p", &[]);
            let text = env.document.create_text(&format!("Streamed line {}", i));
            env.document.append_child(&item, &text, MutationOrigin::Host);
            env.document.append_child(&feed, &item, MutationOrigin::Host);
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        session.wait_idle().await;
        session.stats()
    })
    .await;

    let calls = env.translator.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].len(), 5);
    assert_eq!(stats.passes, 2);
    assert_eq!(env.annotation_count(), 6);
}

/// 停止后不再修改文档，但在途批次的结果仍写入缓存
#[tokio::test(start_paused = true)]
async fn test_stop_prevents_patching() {
    let env = TestEnvironment::with_parts(
        "<p id=\"greeting\">Hello world</p>",
        TestConfigBuilder::new().build(),
        MockTranslator::new().with_delay(Duration::from_millis(100)),
    );
    let p = HtmlTestHelper::by_id(&env.root, "greeting").unwrap();
    let unit = HtmlTestHelper::first_child(&p);

    run_local(async {
        let session = env.session();
        session.start();
        assert!(session.stop());
        assert!(!session.stop());
        assert!(!session.is_active());
        session.wait_idle().await;

        // 停止后的修改不会被观察
        let extra = env.document.create_element("p", &[]);
        let text = env.document.create_text("Ignored after stop");
        env.document.append_child(&extra, &text, MutationOrigin::Host);
        env.document
            .append_child(&env.root, &extra, MutationOrigin::Host);
        tokio::time::sleep(Duration::from_secs(1)).await;
        session.wait_idle().await;
    })
    .await;

    assert_eq!(env.translator.call_count(), 1);
    assert_eq!(HtmlTestHelper::unit_text(&env.document, &unit), "Hello world");
    assert_eq!(env.annotation_count(), 0);
    assert_eq!(env.cache.get("Hello world"), Some(fake_translation("Hello world")));
}

/// 结果返回前被移除的单元不会被修改
#[tokio::test(start_paused = true)]
async fn test_removed_unit_is_skipped() {
    let env = TestEnvironment::with_parts(
        "<p id=\"gone\">Soon removed</p><p id=\"kept\">Still here</p>",
        TestConfigBuilder::new().build(),
        MockTranslator::new().with_delay(Duration::from_millis(100)),
    );
    let gone = HtmlTestHelper::by_id(&env.root, "gone").unwrap();
    let kept = HtmlTestHelper::by_id(&env.root, "kept").unwrap();
    let kept_unit = HtmlTestHelper::first_child(&kept);

    let stats = run_local(async {
        let session = env.session();
        session.start();
        env.document.remove(&gone, MutationOrigin::Host);
        session.wait_idle().await;
        session.stats()
    })
    .await;

    assert_eq!(stats.detached_skips, 1);
    assert_eq!(env.annotation_count(), 1);
    assert_eq!(
        HtmlTestHelper::annotation_after(&kept_unit),
        Some(fake_translation("Still here"))
    );
}

/// 文档级入口：解析、翻译并序列化
#[tokio::test(start_paused = true)]
async fn test_translate_html_end_to_end() {
    use std::sync::Arc;

    use livetrans::translation::storage::cache::TranslationCache;
    use livetrans::translation::TranslationConfig;

    let translator = Arc::new(MockTranslator::new().with_fixed(&[
        ("Hello world", "你好世界"),
        ("Goodbye", "再见"),
    ]));
    let output = livetrans::translate_html(
        b"<html><head><title>Page</title></head><body><p>Hello world</p><p>Goodbye</p></body></html>",
        None,
        TranslationConfig::default(),
        translator.clone(),
        Arc::new(TranslationCache::new()),
    )
    .await
    .unwrap();

    let html = String::from_utf8(output).unwrap();
    assert!(html.contains("<p><font class=\"livetrans-trans-node\">你好世界</font></p>"));
    assert!(html.contains("<p><font class=\"livetrans-trans-node\">再见</font></p>"));
    // 标题位于 body 之外，不参与翻译
    assert!(html.contains("<title>Page</title>"));
    assert_eq!(translator.call_count(), 1);
}

//! Widget behaviour through the public API

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Notify;

use playground_core::block::Segment;
use playground_core::compiler::{Compiler, CompilerSource};
use playground_core::controller::MemoryClipboard;
use playground_core::script::ScriptCompiler;
use playground_core::{
    CompilerLoader, CompilerOptions, LoadFailure, Playground, PlaygroundRuntime, PresentationMeta,
    RenderedBlock, RunAttempt, RunStatus, SandboxEvaluator, ScriptTarget,
};

/// Counts fetches and holds each one until released
#[derive(Default)]
struct SlowSource {
    fetches: AtomicUsize,
    release: Notify,
}

#[async_trait]
impl CompilerSource for SlowSource {
    async fn fetch(&self, _locator: &str) -> Result<Arc<dyn Compiler>, LoadFailure> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.release.notified().await;
        Ok(Arc::new(ScriptCompiler::new()))
    }
}

/// Fails the first fetch, succeeds afterwards
#[derive(Default)]
struct FlakySource {
    fetches: AtomicUsize,
}

#[async_trait]
impl CompilerSource for FlakySource {
    async fn fetch(&self, locator: &str) -> Result<Arc<dyn Compiler>, LoadFailure> {
        if self.fetches.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(LoadFailure::Fetch {
                locator: locator.to_string(),
                reason: "connection reset".to_string(),
            });
        }
        Ok(Arc::new(ScriptCompiler::new()))
    }
}

fn runtime_with(loader: Arc<CompilerLoader>) -> PlaygroundRuntime {
    PlaygroundRuntime::new(loader, Arc::new(SandboxEvaluator::default()))
}

fn bundled_runtime() -> PlaygroundRuntime {
    runtime_with(Arc::new(CompilerLoader::bundled("bundled:snippet-script")))
}

fn widget(source: &str) -> Playground {
    Playground::new(RenderedBlock::parse(source), PresentationMeta::default(), bundled_runtime())
}

async fn output(playground: &Playground) -> String {
    match playground.run().await {
        RunAttempt::Completed(result) => result.text(),
        RunAttempt::Busy => panic!("Run should not be busy"),
    }
}

#[tokio::test]
async fn test_output_is_log_calls_in_order() {
    let playground = widget(
        r#"
interface Node { value: number; next: Node | null }

function build(values: number[]): Node | null {
    let head: Node | null = null;
    for (let i = values.length - 1; i >= 0; i--) {
        head = { value: values[i], next: head };
    }
    return head;
}

let node = build([1, 2, 3]);
while (node) {
    console.log('node', node.value);
    node = node.next;
}
console.log('done');
"#,
    );

    assert_eq!(output(&playground).await, "node 1\nnode 2\nnode 3\ndone");
}

#[tokio::test]
async fn test_same_snippet_twice_is_identical() {
    let playground = widget("const m = new Map<string, number>([['a', 1]]); console.log(m.get('a'), [...m.keys()].join());");

    let first = playground.run().await;
    let second = playground.run().await;

    assert_eq!(first, second);
    assert_eq!(first.result().map(|r| r.text()).as_deref(), Some("1 a"));
}

#[tokio::test]
async fn test_edit_then_run_uses_edit_buffer() {
    let playground = widget("console.log(1)");

    playground.toggle_edit();
    playground.edit("console.log(2)").unwrap();

    assert_eq!(output(&playground).await, "2");
}

#[tokio::test]
async fn test_overlapping_run_is_refused() {
    let source = Arc::new(SlowSource::default());
    let loader = Arc::new(CompilerLoader::new(source.clone(), "slow:ts"));
    let playground = Arc::new(Playground::new(
        RenderedBlock::from_code("console.log('only once');"),
        PresentationMeta::default(),
        runtime_with(loader.clone()),
    ));

    let first = {
        let playground = playground.clone();
        tokio::spawn(async move { playground.run().await })
    };
    while playground.status() != RunStatus::Loading || loader.waiters() == 0 {
        tokio::task::yield_now().await;
    }

    assert_eq!(playground.run().await, RunAttempt::Busy);
    assert_eq!(playground.last_result(), None);

    source.release.notify_one();
    let first = first.await.unwrap();
    assert_eq!(first.result().map(|r| r.text()).as_deref(), Some("only once"));
    assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_two_widgets_share_one_fetch() {
    let source = Arc::new(SlowSource::default());
    let loader = Arc::new(CompilerLoader::new(source.clone(), "slow:ts"));

    let left = Arc::new(Playground::new(
        RenderedBlock::from_code("console.log('left');"),
        PresentationMeta::default(),
        runtime_with(loader.clone()),
    ));
    let right = Arc::new(Playground::new(
        RenderedBlock::from_code("console.log('right');"),
        PresentationMeta::default(),
        runtime_with(loader.clone()),
    ));

    let left_run = {
        let left = left.clone();
        tokio::spawn(async move { left.run().await })
    };
    let right_run = {
        let right = right.clone();
        tokio::spawn(async move { right.run().await })
    };
    while loader.waiters() < 2 {
        tokio::task::yield_now().await;
    }
    source.release.notify_one();

    let left_result = left_run.await.unwrap();
    let right_result = right_run.await.unwrap();

    assert_eq!(left_result.result().map(|r| r.text()).as_deref(), Some("left"));
    assert_eq!(right_result.result().map(|r| r.text()).as_deref(), Some("right"));
    assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    assert_eq!(loader.fetch_count(), 1);

    let first = loader.ensure_loaded().await.unwrap();
    let second = loader.ensure_loaded().await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[tokio::test]
async fn test_thrown_error_becomes_error_line() {
    let playground = widget("console.log('start');\nthrow new Error('boom')");

    let text = output(&playground).await;

    assert_eq!(text, "start\nError: boom");
    assert_eq!(text.lines().filter(|line| line.starts_with("Error:")).count(), 1);
}

#[tokio::test]
async fn test_objects_render_as_indented_text() {
    let playground = widget("console.log({a:1})");

    let text = output(&playground).await;

    assert_ne!(text, "[object Object]");
    assert_eq!(text, "{\n  \"a\": 1\n}");
}

#[test]
fn test_copy_never_includes_decorations() {
    let clipboard = Arc::new(MemoryClipboard::new());
    let block = RenderedBlock::new(vec![
        Segment::Code("const queue: number[] = [];\n".to_string()),
        Segment::Decoration("1 │ ".to_string()),
        Segment::Code("queue.push(1);\n".to_string()),
    ]);
    let playground = Playground::new(
        block,
        PresentationMeta::default(),
        bundled_runtime().with_clipboard(clipboard.clone()),
    );

    let copied = playground.copy().unwrap();

    assert_eq!(copied, "const queue: number[] = [];\nqueue.push(1);\n");
    assert!(!copied.contains('│'));
    assert_eq!(clipboard.contents(), Some(copied));
}

#[tokio::test]
async fn test_failed_load_then_success_fetches_twice() {
    let source = Arc::new(FlakySource::default());
    let loader = Arc::new(CompilerLoader::new(source.clone(), "flaky:ts"));
    let playground = Playground::new(
        RenderedBlock::from_code("console.log('ok')"),
        PresentationMeta::default(),
        runtime_with(loader.clone()),
    );

    let first = output(&playground).await;
    assert_eq!(
        first,
        "Error: Failed to load compiler from 'flaky:ts': connection reset"
    );

    let second = output(&playground).await;
    assert_eq!(second, "ok");
    assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_transpile_failure_replaces_but_throw_keeps_lines() {
    let playground = widget("console.log('first');");
    assert_eq!(output(&playground).await, "first");

    playground.toggle_edit();
    playground.edit("import fs from 'fs';\nconsole.log('never');").unwrap();
    let failed = playground.run().await.into_result().unwrap();
    assert!(failed.is_failure());
    assert!(failed.lines.is_empty());
    assert!(failed.text().contains("Cannot use import statement outside a module"));

    playground.edit("console.log('kept'); null.boom;").unwrap();
    let thrown = output(&playground).await;
    assert_eq!(
        thrown,
        "kept\nError: Cannot read properties of null (reading 'boom')"
    );
}

#[tokio::test]
async fn test_exponent_lowering_matches_native() {
    let source = "console.log(2 ** 10, (-2) ** 3, 2 ** -1);";
    let mut outputs = Vec::new();

    for target in [ScriptTarget::Es2015, ScriptTarget::EsNext] {
        let runtime = bundled_runtime().with_options(CompilerOptions {
            target,
            strict: true,
        });
        let playground =
            Playground::new(RenderedBlock::from_code(source), PresentationMeta::default(), runtime);
        outputs.push(output(&playground).await);
    }

    assert_eq!(outputs[0], "1024 -8 0.5");
    assert_eq!(outputs[0], outputs[1]);
}

#[tokio::test]
async fn test_deep_recursion_is_contained() {
    let playground = widget("function down(n: number): number { return down(n + 1); }\ndown(0);");

    assert_eq!(output(&playground).await, "Error: Maximum call stack size exceeded");
    assert_eq!(playground.status(), RunStatus::Ready);
}

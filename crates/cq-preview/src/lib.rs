//! Preview document assembly and sandboxed script execution.
//!
//! Every render builds a complete standalone document from the three source
//! buffers and runs its script side in a fresh, isolated engine context, so
//! sandbox globals never survive a rebuild. Console traffic and errors are
//! captured by an instrumentation shim and forwarded through the preview
//! channel; nothing raised inside the sandbox escapes to the host.

use boa_engine::Context;
use boa_engine::Source;
use cq_buffers::SourceSet;
use cq_channel::EventEmitter;
use cq_channel::EventKind;

const EVENT_RECORD_SEPARATOR: char = '\u{001e}';
const EVENT_FIELD_SEPARATOR: char = '\u{001f}';

const CONSOLE_SHIM: &str = r#"
globalThis.__cq_events = [];
(function () {
  function sanitize(text) {
    return text.split("\u001e").join(" ").split("\u001f").join(" ");
  }
  function record(kind, args) {
    var parts = [];
    for (var i = 0; i < args.length; i += 1) {
      parts.push(String(args[i]));
    }
    globalThis.__cq_events.push({ kind: kind, text: sanitize(parts.join(" ")) });
  }
  globalThis.console = {
    log: function () { record("log", arguments); },
    info: function () { record("log", arguments); },
    warn: function () { record("log", arguments); },
    error: function () { record("error", arguments); }
  };
  globalThis.__cq_report_error = function (message) {
    record("error", [message]);
  };
  globalThis.onerror = function (message) {
    globalThis.__cq_report_error(String(message));
    return true;
  };

  globalThis.__cq_timer_queue = [];
  globalThis.__cq_timer_cancelled = {};
  globalThis.__cq_next_timer_id = 1;
  globalThis.setTimeout = function (callback, _delay) {
    var cb = callback;
    if (typeof cb !== "function") {
      var src = String(callback);
      cb = function () { (0, eval)(src); };
    }
    var id = globalThis.__cq_next_timer_id++;
    globalThis.__cq_timer_queue.push({ id: id, cb: cb });
    return id;
  };
  globalThis.clearTimeout = function (id) {
    globalThis.__cq_timer_cancelled[String(id)] = true;
  };
  globalThis.setInterval = function (callback, delay) {
    return globalThis.setTimeout(callback, delay);
  };
  globalThis.clearInterval = globalThis.clearTimeout;
  globalThis.queueMicrotask = function (callback) {
    return globalThis.setTimeout(callback, 0);
  };
  globalThis.__cq_flush_timers = function (limit) {
    var maxRuns = Number(limit) || 0;
    if (maxRuns < 1) {
      maxRuns = 1;
    }
    var runs = 0;
    while (globalThis.__cq_timer_queue.length > 0 && runs < maxRuns) {
      var task = globalThis.__cq_timer_queue.shift();
      if (!task) {
        continue;
      }
      var cancelled = !!globalThis.__cq_timer_cancelled[String(task.id)];
      delete globalThis.__cq_timer_cancelled[String(task.id)];
      if (!cancelled) {
        try {
          task.cb();
        } catch (error) {
          globalThis.__cq_report_error(
            (error && error.message) ? error.message : String(error)
          );
        }
      }
      runs++;
    }
    return runs;
  };

  // Only rejections created through the Promise surface are tracked;
  // rejections propagating through internal chains are not observed.
  var NativePromise = globalThis.Promise;
  if (typeof NativePromise === "function") {
    var nativeThen = NativePromise.prototype.then;
    NativePromise.prototype.then = function (onFulfilled, onRejected) {
      if (typeof onRejected === "function") {
        this.__cq_handled = true;
      }
      return nativeThen.call(this, onFulfilled, onRejected);
    };
    NativePromise.prototype["catch"] = function (onRejected) {
      return this.then(undefined, onRejected);
    };
    function watch(holder, reason) {
      globalThis.queueMicrotask(function () {
        var promise = holder.ref;
        if (!promise || !promise.__cq_handled) {
          globalThis.__cq_report_error("Unhandled promise rejection: " + String(reason));
        }
      });
    }
    function CqPromise(executor) {
      var holder = {};
      var promise = new NativePromise(function (resolve, reject) {
        executor(resolve, function (reason) {
          watch(holder, reason);
          reject(reason);
        });
      });
      holder.ref = promise;
      return promise;
    }
    CqPromise.prototype = NativePromise.prototype;
    CqPromise.resolve = function (value) { return NativePromise.resolve(value); };
    CqPromise.reject = function (reason) {
      var holder = {};
      var promise = NativePromise.reject(reason);
      holder.ref = promise;
      watch(holder, reason);
      return promise;
    };
    CqPromise.all = function (list) { return NativePromise.all(list); };
    CqPromise.race = function (list) { return NativePromise.race(list); };
    globalThis.Promise = CqPromise;
  }
})();
"#;

const FLUSH_TIMERS: &str =
    "(typeof __cq_flush_timers === 'function') ? __cq_flush_timers(128) : 0;";

const HARVEST_EVENTS: &str = r#"
(function () {
  if (!globalThis.__cq_events) {
    return "";
  }
  var out = [];
  for (var i = 0; i < globalThis.__cq_events.length; i += 1) {
    var event = globalThis.__cq_events[i];
    out.push(event.kind + "\u001f" + event.text);
  }
  return out.join("\u001e");
})()
"#;

/// The derived, ephemeral preview. `markup` is the full standalone document;
/// `script` is the instrumented portion the sandbox executes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewDocument {
    pub markup: String,
    pub script: String,
}

/// Builds a complete preview document: CSS verbatim in a `<style>` block,
/// HTML verbatim in the body, instrumentation shim, then the user JS wrapped
/// so uncaught synchronous exceptions are captured instead of escaping.
pub fn build_preview(sources: &SourceSet) -> PreviewDocument {
    let guarded = format!(
        "try {{\n{}\n}} catch (error) {{\n  console.error(\"Error: \" + \
         ((error && error.message) ? error.message : String(error)));\n}}",
        sources.js
    );
    let script = format!("{CONSOLE_SHIM}\n{guarded}");

    let markup = format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<style>\n{}\n</style>\n</head>\n<body>\n{}\n\
         <script>\n{script}\n</script>\n</body>\n</html>\n",
        sources.css, sources.html
    );

    PreviewDocument { markup, script }
}

/// Engine hardening knobs, applied to every sandbox context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SandboxConfig {
    pub recursion_limit: usize,
    pub stack_size_limit: usize,
    pub loop_iteration_limit: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            recursion_limit: 64,
            stack_size_limit: 1024,
            loop_iteration_limit: 100_000,
        }
    }
}

/// Executes preview scripts in isolated, limit-bounded engine contexts.
#[derive(Debug, Clone, Default)]
pub struct PreviewSandbox {
    config: SandboxConfig,
}

impl PreviewSandbox {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    /// Runs the script side of a preview document in a fresh context and
    /// forwards captured console/error traffic through `emitter`. Never
    /// returns an error to the host: every failure path degrades to an
    /// error-kind event.
    pub fn execute(&self, doc: &PreviewDocument, emitter: &EventEmitter) {
        let mut context = Context::default();
        context
            .runtime_limits_mut()
            .set_recursion_limit(self.config.recursion_limit);
        context
            .runtime_limits_mut()
            .set_stack_size_limit(self.config.stack_size_limit);
        context
            .runtime_limits_mut()
            .set_loop_iteration_limit(self.config.loop_iteration_limit);

        if let Err(error) = context.eval(Source::from_bytes(doc.script.as_bytes())) {
            let _ = emitter.emit(EventKind::Error, format!("Error: {error}"));
        }
        let _ = context.run_jobs();

        let _ = context.eval(Source::from_bytes(FLUSH_TIMERS.as_bytes()));
        let _ = context.run_jobs();

        for (kind, text) in harvest_events(&mut context) {
            let _ = emitter.emit(kind, text);
        }
    }
}

fn harvest_events(context: &mut Context) -> Vec<(EventKind, String)> {
    let Ok(value) = context.eval(Source::from_bytes(HARVEST_EVENTS.as_bytes())) else {
        return Vec::new();
    };
    let Ok(joined) = value.to_string(context) else {
        return Vec::new();
    };

    let joined = joined.to_std_string_escaped();
    let mut events = Vec::new();
    for record in joined.split(EVENT_RECORD_SEPARATOR) {
        if record.is_empty() {
            continue;
        }

        let (tag, text) = record
            .split_once(EVENT_FIELD_SEPARATOR)
            .unwrap_or((record, ""));
        let Some(kind) = EventKind::from_tag(tag) else {
            continue;
        };
        events.push((kind, text.to_owned()));
    }
    events
}

use std::time::Duration;

use indicatif::{
    ProgressBar,
    ProgressDrawTarget,
    ProgressStyle,
};

const SPINNER_TEMPLATE: &str = "{msg}{spinner}";
const TICK_MILLISECONDS: u64 = 120;

pub trait Progress: Send + Sync {
    fn tick(&self, detail: Option<&str>);
    fn done(&self);
    fn fail(&self, msg: &str);
}

pub struct NoProgress;

impl Progress for NoProgress {
    fn tick(&self, _detail: Option<&str>) {}
    fn done(&self) {}
    fn fail(&self, _msg: &str) {}
}

/// `Creating cluster foo...⠇` on stderr while waiting, then `Creating cluster foo...done.`
pub struct SpinnerProgress {
    bar: ProgressBar,
    message: String,
}

impl SpinnerProgress {
    pub fn new(message: &str) -> SpinnerProgress {
        let bar = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
        bar.set_style(ProgressStyle::with_template(SPINNER_TEMPLATE).unwrap_or_else(|_| ProgressStyle::default_spinner()));
        bar.set_message(format!("{message}..."));
        bar.enable_steady_tick(Duration::from_millis(TICK_MILLISECONDS));
        SpinnerProgress { bar, message: message.into() }
    }

    fn finish(&self, suffix: &str) {
        let line = format!("{}...{suffix}", self.message);
        if self.bar.is_hidden() {
            eprintln!("{line}");
        }
        self.bar.finish_with_message(line);
    }
}

impl Progress for SpinnerProgress {
    fn tick(&self, detail: Option<&str>) {
        match detail {
            Some(d) => self.bar.set_message(format!("{} ({d})...", self.message)),
            None => self.bar.set_message(format!("{}...", self.message)),
        }
    }

    fn done(&self) {
        self.finish("done.");
    }

    fn fail(&self, _msg: &str) {
        self.finish("failed.");
    }
}

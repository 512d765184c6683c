//! 会话生命周期暴露给界面层的钩子，以及一个终端实现。

use std::io::Write;

use crate::types::ScanProgress;

pub trait SessionView {
    /// 新会话开始，清空上一次的结果并显示"等待结果"
    fn clear_results(&mut self);

    fn append_result(&mut self, path: &str);

    /// 替换唯一的进度行
    fn show_progress(&mut self, progress: ScanProgress);

    fn show_error(&mut self, message: &str);

    fn show_no_results(&mut self);

    fn show_summary(&mut self, summary: &str, total: usize);

    /// true: 搜索进行中（禁用表单、启用停止按钮）
    fn set_running(&mut self, running: bool);

    fn set_export_enabled(&mut self, enabled: bool);

    /// 用户主动停止后的界面状态
    fn show_stopped(&mut self) {}

    fn notify_complete(&mut self) {}
}

/// 结果写到 stdout，进度、错误和提示写到 stderr
pub struct ConsoleView {
    bell: bool,
    progress_visible: bool,
}

impl ConsoleView {
    pub fn new(bell: bool) -> Self {
        Self {
            bell,
            progress_visible: false,
        }
    }

    fn end_progress_line(&mut self) {
        if self.progress_visible {
            eprintln!();
            self.progress_visible = false;
        }
    }
}

impl SessionView for ConsoleView {
    fn clear_results(&mut self) {
        self.progress_visible = false;
        eprintln!("等待结果...");
    }

    fn append_result(&mut self, path: &str) {
        self.end_progress_line();
        println!("{}", path);
    }

    fn show_progress(&mut self, progress: ScanProgress) {
        let mut err = std::io::stderr().lock();
        let _ = write!(
            err,
            "\r已扫描 {} 个文件，找到 {} 个",
            progress.scanned, progress.found
        );
        let _ = err.flush();
        self.progress_visible = true;
    }

    fn show_error(&mut self, message: &str) {
        self.end_progress_line();
        eprintln!("错误: {}", message);
    }

    fn show_no_results(&mut self) {
        self.end_progress_line();
        eprintln!("没有找到结果");
    }

    fn show_summary(&mut self, summary: &str, total: usize) {
        self.end_progress_line();
        if summary.is_empty() {
            eprintln!("完成，共 {} 个结果", total);
        } else {
            eprintln!("{}", summary);
        }
    }

    fn set_running(&mut self, _running: bool) {}

    fn set_export_enabled(&mut self, _enabled: bool) {}

    fn show_stopped(&mut self) {
        self.end_progress_line();
        eprintln!("搜索已停止");
    }

    fn notify_complete(&mut self) {
        if self.bell {
            let mut err = std::io::stderr().lock();
            let _ = err.write_all(b"\x07");
            let _ = err.flush();
        }
    }
}

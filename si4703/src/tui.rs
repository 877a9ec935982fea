use crate::{config::Region, Status};
use anyhow::Result;
use crossterm::{
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    prelude::*,
    widgets::{Block, Borders, Gauge, Paragraph},
    Terminal,
};
use std::io;

/// RSSI that fills the gauge, dBµV. Strong local stations sit around here.
const RSSI_FULL_SCALE: u8 = 75;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StatusLine {
    /// MHz
    pub frequency: f64,
    pub rssi: u8,
    pub volume: u8,
    pub stereo: bool,
}

impl StatusLine {
    pub fn new(region: &Region, status: &Status, volume: u8) -> Self {
        Self {
            frequency: region.channel_to_frequency(status.channel),
            rssi: status.rssi,
            volume,
            stereo: status.stereo,
        }
    }

    pub fn frequency_text(&self) -> String {
        format!("{:05.2} MHz", self.frequency)
    }

    pub fn rssi_text(&self) -> String {
        format!("RSSI: {:3} dB", self.rssi)
    }

    pub fn volume_text(&self) -> String {
        let mode = if self.stereo { "ST" } else { "MO" };
        format!("Vol: {:2}/15 {}", self.volume, mode)
    }
}

impl std::fmt::Display for StatusLine {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}  {}  {}",
            self.frequency_text(),
            self.rssi_text(),
            self.volume_text()
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Screen {
    Starting,
    Status(StatusLine),
    /// Startup failed, nothing more will be drawn
    Fatal(String),
}

/// Where status goes: a full screen terminal or plain lines on stdout.
pub trait Display {
    fn render(&mut self, screen: &Screen) -> Result<()>;
}

#[derive(Default)]
pub struct Console;

impl Display for Console {
    fn render(&mut self, screen: &Screen) -> Result<()> {
        match screen {
            Screen::Starting => println!("Starting..."),
            Screen::Status(line) => println!("{line}"),
            Screen::Fatal(msg) => println!("ERROR: {msg}"),
        }
        Ok(())
    }
}

pub fn ui(f: &mut Frame, screen: &Screen) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(0),
        ])
        .split(f.size());

    match screen {
        Screen::Starting => {
            let p = Paragraph::new("Starting...")
                .block(Block::default().title("FM").borders(Borders::ALL));
            f.render_widget(p, chunks[0]);
        }
        Screen::Status(line) => {
            let p = Paragraph::new(format!("{}   {}", line.frequency_text(), line.volume_text()))
                .style(Style::default().add_modifier(Modifier::BOLD))
                .block(Block::default().title("FM").borders(Borders::ALL));
            f.render_widget(p, chunks[0]);

            let percent = u16::from(line.rssi.min(RSSI_FULL_SCALE)) * 100 / u16::from(RSSI_FULL_SCALE);
            let gauge = Gauge::default()
                .block(Block::default().title("Signal").borders(Borders::ALL))
                .gauge_style(Style::default().fg(Color::Green))
                .percent(percent)
                .label(line.rssi_text());
            f.render_widget(gauge, chunks[1]);
        }
        Screen::Fatal(msg) => {
            let p = Paragraph::new(msg.as_str())
                .style(Style::default().fg(Color::Red))
                .block(Block::default().title("ERROR").borders(Borders::ALL));
            f.render_widget(p, chunks[0]);
            let hint = Paragraph::new("Ctrl-C to exit");
            f.render_widget(hint, chunks[1]);
        }
    }
}

/// Full screen status. Raw mode stays off so Ctrl-C still raises SIGINT.
pub struct Tui {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
}

impl Tui {
    pub fn new() -> Result<Self> {
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        terminal.hide_cursor()?;
        Ok(Self { terminal })
    }
}

impl Display for Tui {
    fn render(&mut self, screen: &Screen) -> Result<()> {
        self.terminal.draw(|f| ui(f, screen))?;
        Ok(())
    }
}

impl Drop for Tui {
    fn drop(&mut self) {
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::region::{EUROPE, JAPAN};
    use ratatui::backend::TestBackend;

    fn line() -> StatusLine {
        StatusLine {
            frequency: 101.7,
            rssi: 42,
            volume: 8,
            stereo: true,
        }
    }

    fn draw(screen: &Screen) -> String {
        let mut terminal = Terminal::new(TestBackend::new(50, 10)).unwrap();
        terminal.draw(|f| ui(f, screen)).unwrap();
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    #[test]
    fn status_formats() {
        let line = line();
        assert_eq!(line.frequency_text(), "101.70 MHz");
        assert_eq!(line.rssi_text(), "RSSI:  42 dB");
        assert_eq!(line.volume_text(), "Vol:  8/15 ST");

        let low = StatusLine {
            frequency: 87.5,
            rssi: 7,
            volume: 15,
            stereo: false,
        };
        assert_eq!(low.frequency_text(), "87.50 MHz");
        assert_eq!(low.rssi_text(), "RSSI:   7 dB");
        assert_eq!(low.volume_text(), "Vol: 15/15 MO");
    }

    #[test]
    fn from_status() {
        let status = Status {
            rssi: 30,
            stereo: false,
            stc: true,
            sfbl: false,
            channel: 142,
        };
        let line = StatusLine::new(&EUROPE, &status, 3);
        assert_eq!(line.frequency_text(), "101.70 MHz");
        assert_eq!(line.to_string(), "101.70 MHz  RSSI:  30 dB  Vol:  3/15 MO");
        assert_eq!(StatusLine::new(&JAPAN, &status, 3).frequency_text(), "90.00 MHz");
    }

    #[test]
    fn draws_status() {
        let text = draw(&Screen::Status(line()));
        assert!(text.contains("101.70 MHz"));
        assert!(text.contains("RSSI:  42 dB"));
    }

    #[test]
    fn draws_fatal() {
        let text = draw(&Screen::Fatal("Power up failed".into()));
        assert!(text.contains("ERROR"));
        assert!(text.contains("Power up failed"));
    }
}

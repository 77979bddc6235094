use crate::core::app::{App, UiFocus, UiMode};
use crate::ui::dialog::render_dialog;
use crate::ui::layout::ScreenLayout;
use crate::ui::notifications::render_notifications;
use crate::ui::personas::render_persona_picker;
use crate::ui::settings::render_settings;
use crate::ui::sidebar::render_sidebar;
use crate::ui::transcript::TranscriptMode;
use crate::ui::welcome::render_welcome;
use ratatui::{
    layout::Rect,
    style::Modifier,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

pub fn ui(f: &mut Frame, app: &App) {
    let layout = ScreenLayout::compute(
        f.area(),
        app.ui.sidebar.visible,
        app.ui.input_line_count(),
    );

    render_title(f, layout.title, app);
    if app.ui.transcript.mode() == TranscriptMode::Welcome {
        render_welcome(f, layout.transcript, app.session.model_label(), &app.ui.theme);
    } else {
        render_transcript(f, layout.transcript, app);
    }
    render_input(f, layout.input, app);

    if let Some(area) = layout.sidebar {
        render_sidebar(
            f,
            area,
            &app.ui.sidebar,
            app.session.active_chat_id(),
            app.ui.focus == UiFocus::Sidebar,
            &app.ui.theme,
        );
    }

    match &app.ui.mode {
        UiMode::Settings(form) => render_settings(f, f.area(), form, &app.ui.theme),
        UiMode::Confirm(dialog) => render_dialog(f, f.area(), dialog, &app.ui.theme),
        UiMode::PersonaPicker(picker) => {
            render_persona_picker(f, f.area(), picker, &app.ui.theme)
        }
        UiMode::Typing | UiMode::FilePrompt { .. } => {}
    }
    render_notifications(f, layout.transcript, &app.ui.notifications, &app.ui.theme);
}

fn render_title(f: &mut Frame, area: Rect, app: &App) {
    let theme = &app.ui.theme;
    let caps = app.session.capabilities;
    let flag = |label: &'static str, supported: bool, active: bool| {
        let style = if active {
            theme.capability_on_style.add_modifier(Modifier::BOLD)
        } else if supported {
            theme.capability_on_style
        } else {
            theme.capability_off_style
        };
        Span::styled(format!(" {label}"), style)
    };

    let mut spans = vec![Span::styled(
        format!("murmur v{} · {}", env!("CARGO_PKG_VERSION"), app.session.model_label()),
        theme.title_style,
    )];
    if let Some(persona) = app.session.personas.active() {
        spans.push(Span::styled(format!(" / {}", persona.name), theme.title_style));
    }
    spans.extend([
        Span::raw(" ·"),
        flag("images", caps.supports_images, app.ui.attachments.image().is_some()),
        flag("web", caps.supports_web_search, app.ui.web_search),
        flag("draw", caps.supports_image_generation, app.ui.image_generation),
        Span::styled(
            format!(" · Transcript: {}", app.session.transcript_log.status_string()),
            theme.title_style,
        ),
    ]);
    if app.session.controller.is_streaming() {
        spans.push(Span::styled(" · ● responding", theme.streaming_indicator_style));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_transcript(f: &mut Frame, area: Rect, app: &App) {
    let lines = app
        .ui
        .transcript
        .build_lines(&app.ui.theme, area.width, |id| app.listen_state(id));
    let offset = app.ui.transcript.effective_offset(lines.len(), area.height);
    f.render_widget(Paragraph::new(lines).scroll((offset, 0)), area);
}

fn input_title(app: &App) -> String {
    if let UiMode::FilePrompt { .. } = app.ui.mode {
        return "Attach: path to file (Enter attach · Esc cancel)".to_string();
    }
    let names = app.ui.attachments.names();
    if !names.is_empty() {
        return format!("Attached: {} (Ctrl+X to remove)", names.join(", "));
    }
    if app.session.controller.is_streaming() {
        "Message (Esc to stop · Ctrl+C quit)".to_string()
    } else {
        "Message (Enter send · Alt+Enter newline · Ctrl+S settings · Ctrl+C quit)".to_string()
    }
}

fn render_input(f: &mut Frame, area: Rect, app: &App) {
    let theme = &app.ui.theme;
    let border_style = if app.ui.focus == UiFocus::Input {
        theme.input_border_style
    } else {
        theme.sidebar_border_style
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(Span::styled(input_title(app), theme.input_title_style));
    let inner = block.inner(area);
    f.render_widget(block, area);

    match &app.ui.mode {
        UiMode::FilePrompt { path, .. } => {
            let line = Line::from(vec![
                Span::styled(path.clone(), theme.input_text_style),
                Span::styled(
                    " ",
                    theme.input_text_style.add_modifier(Modifier::REVERSED),
                ),
            ]);
            f.render_widget(Paragraph::new(line), inner);
        }
        _ => f.render_widget(app.ui.textarea(), inner),
    }
}

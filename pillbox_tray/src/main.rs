use libadwaita as adw;
use adw::prelude::*;
use adw::Application;
use chrono::{Local, NaiveDate};
use glib::ControlFlow;
use gtk4 as gtk;
use pillbox_core::config::DataConfig;
use pillbox_core::{
    AlertSurface, Chime, Config, DoseInstance, Error, Notifier, Permission, RegimenDraft,
    RegimenStore, Reminder, TimeOfDay,
};
use std::cell::{Cell, RefCell};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::mpsc::{channel, Sender};
use std::time::Duration;
use tracing::Level;

#[derive(Debug)]
enum UiEvent {
    ShowWindow,
    Submit(RegimenDraft),
    Take {
        regimen_id: String,
        instance_id: String,
    },
    TakeActive,
    Snooze,
    Quit,
    WatcherOnline,
    WatcherOffline,
}

struct PillboxTray {
    tx: Sender<UiEvent>,
}

impl ksni::Tray for PillboxTray {
    fn icon_name(&self) -> String {
        "appointment-soon".into()
    }

    fn icon_pixmap(&self) -> Vec<ksni::Icon> {
        vec![solid_icon(24, 0xFF3498DB)]
    }

    fn id(&self) -> String {
        "pillbox-tray".into()
    }

    fn title(&self) -> String {
        "Pillbox".into()
    }

    fn status(&self) -> ksni::Status {
        ksni::Status::Active
    }

    fn tool_tip(&self) -> ksni::ToolTip {
        ksni::ToolTip {
            icon_name: self.icon_name(),
            icon_pixmap: self.icon_pixmap(),
            title: "Pillbox".into(),
            description: "Medication reminders".into(),
        }
    }

    fn activate(&mut self, _x: i32, _y: i32) {
        let _ = self.tx.send(UiEvent::ShowWindow);
    }

    fn menu(&self) -> Vec<ksni::MenuItem<Self>> {
        vec![
            ksni::MenuItem::Standard(ksni::menu::StandardItem {
                label: "Today's Doses".into(),
                activate: Box::new(|this: &mut Self| {
                    let _ = this.tx.send(UiEvent::ShowWindow);
                }),
                ..Default::default()
            }),
            ksni::MenuItem::Standard(ksni::menu::StandardItem {
                label: "Quit".into(),
                activate: Box::new(|this: &mut Self| {
                    let _ = this.tx.send(UiEvent::Quit);
                }),
                ..Default::default()
            }),
        ]
    }

    fn watcher_online(&self) {
        let _ = self.tx.send(UiEvent::WatcherOnline);
    }

    fn watcher_offine(&self) -> bool {
        let _ = self.tx.send(UiEvent::WatcherOffline);
        true
    }
}

fn solid_icon(size: i32, argb: u32) -> ksni::Icon {
    let mut data = Vec::with_capacity((size * size * 4) as usize);
    for _ in 0..(size * size) {
        data.extend_from_slice(&argb.to_be_bytes());
    }
    ksni::Icon {
        width: size,
        height: size,
        data,
    }
}

fn init_logging(data_dir: &Path) {
    let log_path = data_dir.join("pillbox_tray.log");
    let _ = std::fs::create_dir_all(data_dir);

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_writer(move || -> Box<dyn Write + Send> {
            match std::fs::File::options()
                .create(true)
                .append(true)
                .open(&log_path)
            {
                Ok(f) => Box::new(f),
                Err(_) => Box::new(std::io::stdout()),
            }
        })
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn main() {
    let log_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pillbox");
    init_logging(&log_dir);

    let app = Application::builder()
        .application_id("com.pillbox.tray")
        .build();

    app.connect_activate(|app| {
        setup(app);
    });

    app.run();
}

// ============================================================================
// Widgets
// ============================================================================

struct MainWidgets {
    window: adw::ApplicationWindow,
    date: gtk::Label,
    status: gtk::Label,
    timeline: gtk::Box,
    name: gtk::Entry,
    dose: gtk::Entry,
    freq: gtk::Entry,
    start: gtk::Entry,
    days: gtk::Entry,
}

impl MainWidgets {
    fn reset_form(&self) {
        for entry in [&self.name, &self.dose, &self.freq, &self.days] {
            entry.set_text("");
        }
        self.start.set_text(&current_time_of_day());
    }
}

struct AlertWidgets {
    window: adw::ApplicationWindow,
    name: gtk::Label,
    dose: gtk::Label,
    time: gtk::Label,
}

fn current_time_of_day() -> String {
    TimeOfDay::of(&Local::now().naive_local()).to_string()
}

fn format_date(day: NaiveDate) -> String {
    day.format("%A, %B %-d, %Y").to_string()
}

fn labelled_entry(container: &gtk::Box, placeholder: &str) -> gtk::Entry {
    let entry = gtk::Entry::new();
    entry.set_placeholder_text(Some(placeholder));
    container.append(&entry);
    entry
}

fn build_main_window(app: &Application, tx: Sender<UiEvent>) -> MainWidgets {
    let window = adw::ApplicationWindow::builder()
        .application(app)
        .default_width(380)
        .default_height(560)
        .title("Pillbox")
        .hide_on_close(true)
        .build();

    let content = gtk::Box::new(gtk::Orientation::Vertical, 12);
    content.set_margin_top(12);
    content.set_margin_bottom(12);
    content.set_margin_start(12);
    content.set_margin_end(12);
    window.set_content(Some(&content));

    let date = gtk::Label::new(Some(&format_date(Local::now().date_naive())));
    date.add_css_class("title-2");
    content.append(&date);

    let form = gtk::Box::new(gtk::Orientation::Vertical, 6);
    content.append(&form);
    let name = labelled_entry(&form, "Medication name");
    let dose = labelled_entry(&form, "Dose (e.g. 500mg)");
    let freq = labelled_entry(&form, "Every how many hours");
    let start = labelled_entry(&form, "First dose (HH:MM)");
    start.set_text(&current_time_of_day());
    let days = labelled_entry(&form, "Duration in days");

    let add = gtk::Button::with_label("Add Medication");
    add.add_css_class("suggested-action");
    form.append(&add);

    let status = gtk::Label::new(None);
    status.set_wrap(true);
    content.append(&status);

    let timeline = gtk::Box::new(gtk::Orientation::Vertical, 4);
    let scroller = gtk::ScrolledWindow::new();
    scroller.set_vexpand(true);
    scroller.set_child(Some(&timeline));
    content.append(&scroller);

    {
        let (name, dose, freq, start, days) = (
            name.clone(),
            dose.clone(),
            freq.clone(),
            start.clone(),
            days.clone(),
        );
        add.connect_clicked(move |_| {
            let draft = RegimenDraft {
                name: name.text().to_string(),
                dose: dose.text().to_string(),
                freq_hours: freq.text().to_string(),
                start_time: start.text().to_string(),
                duration_days: days.text().to_string(),
            };
            let _ = tx.send(UiEvent::Submit(draft));
        });
    }

    MainWidgets {
        window,
        date,
        status,
        timeline,
        name,
        dose,
        freq,
        start,
        days,
    }
}

fn build_alert_window(app: &Application, tx: Sender<UiEvent>) -> AlertWidgets {
    let window = adw::ApplicationWindow::builder()
        .application(app)
        .default_width(300)
        .default_height(200)
        .title("Time for your medicine")
        .hide_on_close(true)
        .build();

    let content = gtk::Box::new(gtk::Orientation::Vertical, 8);
    content.set_margin_top(16);
    content.set_margin_bottom(16);
    content.set_margin_start(16);
    content.set_margin_end(16);
    window.set_content(Some(&content));

    let time = gtk::Label::new(None);
    time.add_css_class("dim-label");
    content.append(&time);

    let name = gtk::Label::new(None);
    name.add_css_class("title-1");
    content.append(&name);

    let dose = gtk::Label::new(None);
    dose.add_css_class("title-4");
    content.append(&dose);

    let button_row = gtk::Box::new(gtk::Orientation::Horizontal, 6);
    button_row.set_halign(gtk::Align::Center);
    content.append(&button_row);

    let take = gtk::Button::with_label("Take Now");
    take.add_css_class("suggested-action");
    let snooze = gtk::Button::with_label("Snooze");
    button_row.append(&take);
    button_row.append(&snooze);

    {
        let tx = tx.clone();
        take.connect_clicked(move |_| {
            let _ = tx.send(UiEvent::TakeActive);
        });
    }
    snooze.connect_clicked(move |_| {
        let _ = tx.send(UiEvent::Snooze);
    });

    AlertWidgets {
        window,
        name,
        dose,
        time,
    }
}

// ============================================================================
// Collaborators
// ============================================================================

/// Timeline and alert window, wired back to the event channel
struct GtkSurface {
    main: Rc<MainWidgets>,
    alert: Rc<AlertWidgets>,
    tx: Sender<UiEvent>,
}

impl AlertSurface for GtkSurface {
    fn render_timeline(&mut self, schedule: &[DoseInstance]) {
        let timeline = &self.main.timeline;
        while let Some(child) = timeline.first_child() {
            timeline.remove(&child);
        }

        if schedule.is_empty() {
            let empty = gtk::Label::new(Some("No doses scheduled for today."));
            empty.add_css_class("dim-label");
            timeline.append(&empty);
            return;
        }

        for dose in schedule {
            let mark = if dose.is_taken { "✓" } else { "○" };
            let row = gtk::Button::with_label(&format!(
                "{}   {}   {} · {}",
                dose.time_string, mark, dose.name, dose.dose
            ));

            if dose.is_taken {
                row.set_sensitive(false);
            } else {
                let tx = self.tx.clone();
                let regimen_id = dose.regimen_id.clone();
                let instance_id = dose.instance_id.clone();
                row.connect_clicked(move |_| {
                    let _ = tx.send(UiEvent::Take {
                        regimen_id: regimen_id.clone(),
                        instance_id: instance_id.clone(),
                    });
                });
            }

            timeline.append(&row);
        }
    }

    fn render_alert(&mut self, dose: &DoseInstance) {
        self.alert.time.set_text(&format!("Due at {}", dose.time_string));
        self.alert.name.set_text(&dose.name);
        self.alert.dose.set_text(&dose.dose);
        self.alert.window.present();
    }

    fn clear_alert(&mut self) {
        self.alert.window.set_visible(false);
    }
}

/// Desktop notifications through the GApplication
struct DesktopNotifier {
    app: Application,
}

impl Notifier for DesktopNotifier {
    fn request_permission(&mut self) -> Permission {
        if self.app.is_registered() {
            Permission::Granted
        } else {
            Permission::Unsupported
        }
    }

    fn notify(&mut self, title: &str, body: &str) -> pillbox_core::Result<()> {
        if !self.app.is_registered() {
            return Err(Error::Notification("application is not registered".into()));
        }
        let notification = gio::Notification::new(title);
        notification.set_body(Some(body));
        notification.set_priority(gio::NotificationPriority::High);
        self.app
            .send_notification(Some("pillbox-dose-due"), &notification);
        Ok(())
    }
}

/// Two display beeps a moment apart
struct DisplayChime;

impl Chime for DisplayChime {
    fn play(&mut self) -> pillbox_core::Result<()> {
        let display = gtk::gdk::Display::default()
            .ok_or_else(|| Error::Audio("no display available".into()))?;
        display.beep();
        glib::timeout_add_local_once(Duration::from_millis(250), move || display.beep());
        Ok(())
    }
}

// ============================================================================
// Event loop
// ============================================================================

fn setup(app: &Application) {
    // Keep running in the tray when the window is closed.
    Box::leak(Box::new(app.hold()));

    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("Failed to load config: {}; using defaults", err);
            Config::default()
        }
    };
    let data_dir = config.data.data_dir.clone();

    let (tx, rx) = channel::<UiEvent>();

    let main = Rc::new(build_main_window(app, tx.clone()));
    let alert = Rc::new(build_alert_window(app, tx.clone()));

    let store = RegimenStore::open_file(DataConfig::store_path(&data_dir));
    let reminder = Reminder::new(store, &config)
        .with_surface(GtkSurface {
            main: main.clone(),
            alert,
            tx: tx.clone(),
        })
        .with_chime(DisplayChime)
        .with_notifier(DesktopNotifier { app: app.clone() });
    let reminder = Rc::new(RefCell::new(reminder));
    reminder.borrow_mut().start(Local::now());

    let _svc = ksni::TrayService::new(PillboxTray { tx }).spawn();

    {
        let reminder = reminder.clone();
        let main = main.clone();
        let app_weak = app.downgrade();
        glib::timeout_add_local(Duration::from_millis(300), move || {
            while let Ok(event) = rx.try_recv() {
                if let UiEvent::Quit = event {
                    if let Some(app) = app_weak.upgrade() {
                        app.quit();
                    }
                    return ControlFlow::Break;
                }
                handle_event(&reminder, &main, event);
            }
            ControlFlow::Continue
        });
    }

    {
        let main = main.clone();
        let last_day = Cell::new(Local::now().date_naive());
        glib::timeout_add_local(config.alerts.poll_interval(), move || {
            let now = Local::now();
            let mut reminder = reminder.borrow_mut();

            if now.date_naive() != last_day.get() {
                last_day.set(now.date_naive());
                main.date.set_text(&format_date(now.date_naive()));
            }

            // Redraw every poll so doses added or taken from the CLI show up
            reminder.refresh(now);
            reminder.tick(now);
            ControlFlow::Continue
        });
    }

    main.window.present();
}

fn handle_event(reminder: &Rc<RefCell<Reminder>>, main: &MainWidgets, event: UiEvent) {
    let now = Local::now();
    match event {
        UiEvent::ShowWindow => {
            reminder.borrow_mut().refresh(now);
            main.window.present();
        }
        UiEvent::Submit(draft) => {
            let result = reminder.borrow_mut().add_regimen(&draft, now);
            match result {
                Ok(regimen) => {
                    main.status.set_text(&format!("✓ {} scheduled!", regimen.name));
                    main.reset_form();
                }
                Err(err) => {
                    tracing::info!("Rejected regimen: {}", err);
                    main.status.set_text(&format!("✗ {}", err));
                }
            }
        }
        UiEvent::Take {
            regimen_id,
            instance_id,
        } => {
            reminder
                .borrow_mut()
                .mark_taken(&regimen_id, &instance_id, now);
        }
        UiEvent::TakeActive => {
            reminder.borrow_mut().take_active(now);
        }
        UiEvent::Snooze => {
            reminder.borrow_mut().snooze();
            main.status.set_text("Reminder dismissed for now.");
        }
        UiEvent::Quit => {}
        UiEvent::WatcherOnline => tracing::info!("StatusNotifier watcher detected"),
        UiEvent::WatcherOffline => {
            tracing::warn!("StatusNotifier watcher went offline; window stays reachable")
        }
    }
}

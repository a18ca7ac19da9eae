use anyhow::{anyhow, Result};
use sysinfo::Pid;
use tracing::instrument;
use xcb::{
    x::{Atom, GetProperty, InternAtom, Window, ATOM_ANY},
    Connection,
};

use super::{ForegroundQuery, ForegroundWindow};

fn intern_atom(conn: &Connection, name: &[u8]) -> Result<Atom> {
    let reply = conn.wait_for_reply(conn.send_request(&InternAtom {
        only_if_exists: false,
        name,
    }))?;
    Ok(reply.atom())
}

fn get_active_window(conn: &Connection, root: Window, active_window_atom: Atom) -> Result<Window> {
    let result = conn.wait_for_reply(conn.send_request(&GetProperty {
        delete: false,
        window: root,
        property: active_window_atom,
        r#type: ATOM_ANY,
        long_offset: 0,
        long_length: 1,
    }))?;
    result
        .value::<Window>()
        .first()
        .copied()
        .ok_or_else(|| anyhow!("Root window has no active window property"))
}

fn get_window_title(conn: &Connection, window: Window, wm_name_atom: Atom) -> Result<String> {
    let wm_name = conn.wait_for_reply(conn.send_request(&GetProperty {
        delete: false,
        window,
        property: wm_name_atom,
        r#type: ATOM_ANY,
        long_offset: 0,
        long_length: 1024,
    }))?;
    Ok(String::from_utf8_lossy(wm_name.value()).to_string())
}

fn get_window_pid(conn: &Connection, window: Window, pid_atom: Atom) -> Result<Option<u32>> {
    let result = conn.wait_for_reply(conn.send_request(&GetProperty {
        delete: false,
        window,
        property: pid_atom,
        r#type: ATOM_ANY,
        long_offset: 0,
        long_length: 1,
    }))?;
    Ok(result.value::<u32>().first().copied())
}

fn get_process_path(id: u32) -> Option<String> {
    let system = sysinfo::System::new_all();
    let process = system.process(Pid::from_u32(id))?;
    process
        .exe()
        .and_then(|v| v.to_str())
        .map(|v| v.to_string())
}

pub struct LinuxForegroundQuery {
    connection: Connection,
    preferred_screen: i32,
    active_window_atom: Atom,
    window_name_atom: Atom,
    pid_atom: Atom,
}

impl LinuxForegroundQuery {
    pub fn new() -> Result<Self> {
        let (connection, preferred_screen) = Connection::connect(None)?;
        let active_window_atom = intern_atom(&connection, b"_NET_ACTIVE_WINDOW")?;
        let window_name_atom = intern_atom(&connection, b"_NET_WM_NAME")?;
        let pid_atom = intern_atom(&connection, b"_NET_WM_PID")?;
        Ok(Self {
            connection,
            preferred_screen,
            active_window_atom,
            window_name_atom,
            pid_atom,
        })
    }

    #[instrument(skip(self))]
    fn get_foreground_inner(&self) -> Result<ForegroundWindow> {
        let setup = self.connection.get_setup();

        // Currently the application only supports 1 x11 screen.
        let root = setup
            .roots()
            .nth(self.preferred_screen.max(0) as usize)
            .ok_or_else(|| anyhow!("Preferred x11 screen is missing"))?
            .root();

        let active_window = get_active_window(&self.connection, root, self.active_window_atom)?;
        let title = get_window_title(&self.connection, active_window, self.window_name_atom)?;
        let process_path = get_window_pid(&self.connection, active_window, self.pid_atom)?
            .and_then(get_process_path)
            .ok_or_else(|| anyhow!("Active window has no resolvable process"))?;

        Ok(ForegroundWindow::new(&process_path, title))
    }
}

impl ForegroundQuery for LinuxForegroundQuery {
    #[instrument(skip(self))]
    fn foreground_window(&mut self) -> Result<ForegroundWindow> {
        self.get_foreground_inner()
    }
}

//! Windows event capture through low-level hooks. The hook thread owns a
//! message loop; callbacks classify each event and push it into the tracker
//! queue without blocking.

use std::{
    cell::RefCell,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
    thread::JoinHandle,
};

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::error;
use windows::Win32::{
    Foundation::{HWND, LPARAM, LRESULT, WPARAM},
    System::Threading::GetCurrentThreadId,
    UI::{
        Input::KeyboardAndMouse::{VK_BACK, VK_RETURN, VK_SPACE, VK_TAB},
        WindowsAndMessaging::{
            CallNextHookEx, GetMessageW, PostThreadMessageW, SetWindowsHookExW,
            UnhookWindowsHookEx, HHOOK, KBDLLHOOKSTRUCT, MSG, MSLLHOOKSTRUCT, WH_KEYBOARD_LL,
            WH_MOUSE_LL, WM_KEYDOWN, WM_MOUSEMOVE, WM_QUIT, WM_SYSKEYDOWN,
        },
    },
};

use super::{InputEvent, InputListener, KeyPress};

thread_local! {
    static EVENT_SENDER: RefCell<Option<mpsc::Sender<InputEvent>>> = const { RefCell::new(None) };
}

fn deliver(event: InputEvent) {
    EVENT_SENDER.with(|sender| {
        if let Some(sender) = sender.borrow().as_ref() {
            // Dropping on a full queue keeps the hook callback from ever blocking.
            let _ = sender.try_send(event);
        }
    });
}

fn classify_key(virtual_key: u32) -> KeyPress {
    match virtual_key as u16 {
        v if v == VK_BACK.0 => KeyPress::Backspace,
        v if v == VK_SPACE.0 || v == VK_RETURN.0 || v == VK_TAB.0 => KeyPress::WordBoundary,
        _ => KeyPress::Other,
    }
}

unsafe extern "system" fn keyboard_hook(n_code: i32, w_param: WPARAM, l_param: LPARAM) -> LRESULT {
    if n_code >= 0 {
        let kb_struct = &*(l_param.0 as *const KBDLLHOOKSTRUCT);
        if matches!(w_param.0 as u32, WM_KEYDOWN | WM_SYSKEYDOWN) {
            deliver(InputEvent::Key(classify_key(kb_struct.vkCode)));
        }
    }

    CallNextHookEx(HHOOK::default(), n_code, w_param, l_param)
}

unsafe extern "system" fn mouse_hook(n_code: i32, w_param: WPARAM, l_param: LPARAM) -> LRESULT {
    if n_code >= 0 && w_param.0 as u32 == WM_MOUSEMOVE {
        let mouse_struct = &*(l_param.0 as *const MSLLHOOKSTRUCT);
        deliver(InputEvent::PointerMove {
            x: mouse_struct.pt.x as f64,
            y: mouse_struct.pt.y as f64,
        });
    }

    CallNextHookEx(HHOOK::default(), n_code, w_param, l_param)
}

fn run_hook_loop(sender: mpsc::Sender<InputEvent>, thread_id: &AtomicU32) -> Result<()> {
    EVENT_SENDER.with(|s| {
        *s.borrow_mut() = Some(sender);
    });
    thread_id.store(unsafe { GetCurrentThreadId() }, Ordering::SeqCst);

    unsafe {
        let keyboard = SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_hook), None, 0)?;
        let mouse = match SetWindowsHookExW(WH_MOUSE_LL, Some(mouse_hook), None, 0) {
            Ok(v) => v,
            Err(e) => {
                let _ = UnhookWindowsHookEx(keyboard);
                return Err(e.into());
            }
        };

        let mut msg = MSG::default();
        // GetMessageW returns 0 on WM_QUIT and -1 on failure. Hooks run as a side effect of the
        // message pump, the messages themselves need no dispatching.
        while GetMessageW(&mut msg, HWND::default(), 0, 0).0 > 0 {}

        let _ = UnhookWindowsHookEx(keyboard);
        let _ = UnhookWindowsHookEx(mouse);
    }

    EVENT_SENDER.with(|s| {
        *s.borrow_mut() = None;
    });

    Ok(())
}

/// Captures global key and pointer events with `WH_KEYBOARD_LL`/`WH_MOUSE_LL` hooks on a
/// dedicated thread.
pub struct WindowsInputListener {
    hook_thread: Option<JoinHandle<()>>,
    thread_id: Arc<AtomicU32>,
}

impl WindowsInputListener {
    pub fn new() -> Self {
        Self {
            hook_thread: None,
            thread_id: Arc::new(AtomicU32::new(0)),
        }
    }
}

impl Default for WindowsInputListener {
    fn default() -> Self {
        Self::new()
    }
}

impl InputListener for WindowsInputListener {
    fn start(&mut self, events: mpsc::Sender<InputEvent>) -> Result<()> {
        let thread_id = self.thread_id.clone();
        self.hook_thread = Some(std::thread::spawn(move || {
            if let Err(e) = run_hook_loop(events, &thread_id) {
                error!("Input hook loop failed {e:?}");
            }
        }));
        Ok(())
    }

    fn stop(&mut self) {
        let thread_id = self.thread_id.load(Ordering::SeqCst);
        if thread_id != 0 {
            unsafe {
                let _ = PostThreadMessageW(thread_id, WM_QUIT, WPARAM(0), LPARAM(0));
            }
        }
        if let Some(handle) = self.hook_thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for WindowsInputListener {
    fn drop(&mut self) {
        self.stop();
    }
}

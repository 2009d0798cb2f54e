use super::*;
use crate::orders::codes::CodeGenerator;
use crate::pricing::PriceBook;
use crate::utils::ManualClock;
use parking_lot::Mutex;
use shared::order::{CodeStatus, ColorMode, Duplex, PaperSize, PrintConfig};
use std::collections::VecDeque;

mod test_lifecycle;
mod test_queries;

const START: i64 = 1_700_000_000_000;

/// Hands out a fixed sequence of codes, then falls back to counting up
struct SequenceGenerator {
    queue: Mutex<VecDeque<String>>,
    next: Mutex<u32>,
}

impl SequenceGenerator {
    fn new(codes: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            queue: Mutex::new(codes.iter().map(|c| c.to_string()).collect()),
            next: Mutex::new(100_000),
        })
    }
}

impl CodeGenerator for SequenceGenerator {
    fn generate(&self) -> String {
        if let Some(code) = self.queue.lock().pop_front() {
            return code;
        }
        let mut next = self.next.lock();
        *next += 1;
        format!("{:06}", *next)
    }
}

struct TestContext {
    clock: Arc<ManualClock>,
    prices: Arc<PriceBook>,
    manager: OrdersManager,
}

fn create_test_context_with(settings: LifecycleSettings, codes: &[&str]) -> TestContext {
    let clock = Arc::new(ManualClock::new(START));
    let prices = Arc::new(PriceBook::with_defaults());
    let manager = OrdersManager::new(
        OrderStorage::open_in_memory().unwrap(),
        prices.clone(),
        clock.clone(),
        settings,
    )
    .with_code_generator(SequenceGenerator::new(codes));
    TestContext {
        clock,
        prices,
        manager,
    }
}

fn create_test_context() -> TestContext {
    let settings = LifecycleSettings {
        pickup_code_ttl: Duration::from_secs(15 * 60),
        ..LifecycleSettings::default()
    };
    create_test_context_with(settings, &[])
}

fn create_test_request(user_id: &str, pages: u32, copies: u32) -> CreateOrderRequest {
    CreateOrderRequest {
        user_id: user_id.to_string(),
        file_ref: format!("file-{user_id}"),
        print_config: PrintConfig {
            copies,
            color_mode: ColorMode::Bw,
            duplex: Duplex::Single,
            paper_size: PaperSize::A4,
        },
        page_count: pages,
        remark: None,
    }
}

/// Create + pay, returning the order and its pickup code
fn create_paid_order(ctx: &TestContext, user_id: &str) -> (PrintOrder, VerificationCode) {
    let order = ctx
        .manager
        .create_order(create_test_request(user_id, 2, 1))
        .unwrap();
    let confirmation = ctx
        .manager
        .confirm_payment(&order.order_id, &format!("pay-{}", order.order_id))
        .unwrap();
    (confirmation.order, confirmation.pickup_code.unwrap())
}

fn drain_events(rx: &mut broadcast::Receiver<OrderEvent>) -> Vec<OrderEventType> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event.event_type);
    }
    events
}

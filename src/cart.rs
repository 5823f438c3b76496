//! In-memory shopping cart and its checkout state machine.
//!
//! Lines are keyed by medicine id and keep insertion order. Checkout walks
//! Idle -> Confirming -> Success; after a short success window the cart
//! clears itself and returns to Idle. Time is injected through [`Clock`] so
//! the window is testable without sleeping.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::models::MedicineInfo;

/// How long the success screen stays up before the cart resets.
pub const SUCCESS_CLEAR_DELAY: Duration = Duration::from_secs(3);

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall-clock time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CartItem {
    pub medicine: MedicineInfo,
    /// Always at least 1; a line that would drop to 0 is removed instead.
    pub quantity: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutState {
    Idle,
    Confirming,
    Success,
}

pub struct Cart {
    items: Vec<CartItem>,
    state: CheckoutState,
    /// When in Success, the instant the cart clears itself.
    clear_at: Option<Instant>,
    clock: Arc<dyn Clock>,
}

impl Cart {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            items: Vec::new(),
            state: CheckoutState::Idle,
            clear_at: None,
            clock,
        }
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn state(&self) -> CheckoutState {
        self.state
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of units across all lines.
    pub fn total_items(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    pub fn total_price(&self) -> f64 {
        self.items
            .iter()
            .map(|item| item.medicine.price * f64::from(item.quantity))
            .sum()
    }

    /// Add one unit of a medicine. Adding a medicine already in the cart
    /// increments its line instead of creating a duplicate.
    pub fn add(&mut self, medicine: MedicineInfo) {
        if let Some(item) = self.items.iter_mut().find(|i| i.medicine.id == medicine.id) {
            item.quantity += 1;
        } else {
            tracing::debug!(medicine_id = %medicine.id, "Adding new cart line");
            self.items.push(CartItem {
                medicine,
                quantity: 1,
            });
        }
    }

    /// Remove a whole line. Unknown ids are ignored.
    pub fn remove(&mut self, medicine_id: &str) {
        self.items.retain(|item| item.medicine.id != medicine_id);
    }

    /// Set a line's quantity directly. Zero removes the line; unknown ids
    /// are ignored.
    pub fn set_quantity(&mut self, medicine_id: &str, quantity: u32) {
        if quantity == 0 {
            self.remove(medicine_id);
            return;
        }
        if let Some(item) = self
            .items
            .iter_mut()
            .find(|i| i.medicine.id == medicine_id)
        {
            item.quantity = quantity;
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.state = CheckoutState::Idle;
        self.clear_at = None;
    }

    /// Open the confirmation step. No-op on an empty cart or mid-checkout.
    pub fn begin_checkout(&mut self) -> bool {
        if self.items.is_empty() || self.state != CheckoutState::Idle {
            return false;
        }
        self.state = CheckoutState::Confirming;
        true
    }

    /// Back out of the confirmation step, keeping the cart contents.
    pub fn cancel_checkout(&mut self) {
        if self.state == CheckoutState::Confirming {
            self.state = CheckoutState::Idle;
        }
    }

    /// Complete the order. The cart stays visible in Success until
    /// [`SUCCESS_CLEAR_DELAY`] has elapsed, then [`tick`](Self::tick)
    /// clears it.
    pub fn confirm_checkout(&mut self) -> bool {
        if self.state != CheckoutState::Confirming {
            return false;
        }
        tracing::info!(
            items = self.total_items(),
            total = self.total_price(),
            "Order confirmed"
        );
        self.state = CheckoutState::Success;
        self.clear_at = Some(self.clock.now() + SUCCESS_CLEAR_DELAY);
        true
    }

    /// Advance the state machine. Returns true when the success window just
    /// expired and the cart was cleared.
    pub fn tick(&mut self) -> bool {
        match self.clear_at {
            Some(deadline) if self.clock.now() >= deadline => {
                self.clear();
                true
            }
            _ => false,
        }
    }
}

impl Default for Cart {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::sync::Mutex;

    use super::*;
    use crate::catalog::MedicineCatalog;

    struct MockClock {
        now: Mutex<Cell<Instant>>,
    }

    impl MockClock {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                now: Mutex::new(Cell::new(Instant::now())),
            })
        }

        fn advance(&self, by: Duration) {
            let cell = self.now.lock().unwrap();
            cell.set(cell.get() + by);
        }
    }

    impl Clock for MockClock {
        fn now(&self) -> Instant {
            self.now.lock().unwrap().get()
        }
    }

    fn medicine(name: &str) -> MedicineInfo {
        MedicineCatalog::new()
            .search(name)
            .expect("test medicine should resolve")
    }

    #[test]
    fn adding_same_medicine_twice_increments_quantity() {
        let mut cart = Cart::new();
        let med = medicine("Paracetamol");
        cart.add(med.clone());
        cart.add(med.clone());

        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.total_items(), 2);
        assert!((cart.total_price() - med.price * 2.0).abs() < 1e-9);
    }

    #[test]
    fn distinct_medicines_keep_insertion_order() {
        let mut cart = Cart::new();
        cart.add(medicine("Paracetamol"));
        cart.add(medicine("Ibuprofen"));
        cart.add(medicine("Paracetamol"));

        let names: Vec<&str> = cart.items().iter().map(|i| i.medicine.name.as_str()).collect();
        assert_eq!(names, ["Paracetamol", "Ibuprofen"]);
    }

    #[test]
    fn set_quantity_zero_removes_the_line() {
        let mut cart = Cart::new();
        let med = medicine("Paracetamol");
        let id = med.id.clone();
        cart.add(med);

        cart.set_quantity(&id, 5);
        assert_eq!(cart.total_items(), 5);

        cart.set_quantity(&id, 0);
        assert!(cart.is_empty());
    }

    #[test]
    fn remove_and_unknown_ids() {
        let mut cart = Cart::new();
        let med = medicine("Paracetamol");
        let id = med.id.clone();
        cart.add(med);

        cart.remove("MED-nope");
        cart.set_quantity("MED-nope", 7);
        assert_eq!(cart.total_items(), 1);

        cart.remove(&id);
        assert!(cart.is_empty());
    }

    #[test]
    fn checkout_requires_a_nonempty_cart() {
        let mut cart = Cart::new();
        assert!(!cart.begin_checkout());
        assert_eq!(cart.state(), CheckoutState::Idle);

        cart.add(medicine("Paracetamol"));
        assert!(cart.begin_checkout());
        assert_eq!(cart.state(), CheckoutState::Confirming);
    }

    #[test]
    fn cancel_keeps_the_cart() {
        let mut cart = Cart::new();
        cart.add(medicine("Paracetamol"));
        cart.begin_checkout();
        cart.cancel_checkout();

        assert_eq!(cart.state(), CheckoutState::Idle);
        assert_eq!(cart.total_items(), 1);
    }

    #[test]
    fn confirm_outside_confirming_is_rejected() {
        let mut cart = Cart::new();
        cart.add(medicine("Paracetamol"));
        assert!(!cart.confirm_checkout());
        assert_eq!(cart.state(), CheckoutState::Idle);
    }

    #[test]
    fn success_window_clears_cart_after_delay() {
        let clock = MockClock::new();
        let mut cart = Cart::with_clock(clock.clone());
        cart.add(medicine("Paracetamol"));
        cart.begin_checkout();
        assert!(cart.confirm_checkout());
        assert_eq!(cart.state(), CheckoutState::Success);

        // Still inside the window: nothing happens.
        clock.advance(Duration::from_secs(2));
        assert!(!cart.tick());
        assert_eq!(cart.state(), CheckoutState::Success);
        assert_eq!(cart.total_items(), 1);

        clock.advance(Duration::from_secs(2));
        assert!(cart.tick());
        assert_eq!(cart.state(), CheckoutState::Idle);
        assert!(cart.is_empty());

        // The transition fires exactly once.
        assert!(!cart.tick());
    }
}

//! Integration tests for context/store propagation across the node tree.
//!
//! Builds real trees (documents, containers, components, shadow roots),
//! moves nodes around, and asserts the observable notification stream:
//! nearest-ancestor resolution, cache invalidation on detach, own-value
//! shadowing, listener dedup, and action-filtered store delivery.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use cascade_tree::{
    ComponentConfig, Listener, NodeRef, Notification, NotificationKind, ReducerStore,
    RenderPolicy, StoreAction,
};

// =============================================================================
// Fixtures
// =============================================================================

#[derive(Clone, Debug, PartialEq, Default)]
struct State {
    init: Option<bool>,
    value: Option<String>,
}

#[derive(Clone)]
enum Action {
    Initialise(bool),
    Update(String),
    Destroy,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ActionKind {
    Initialise,
    Update,
    Destroy,
}

impl StoreAction for Action {
    type Kind = ActionKind;

    fn kind(&self) -> ActionKind {
        match self {
            Action::Initialise(_) => ActionKind::Initialise,
            Action::Update(_) => ActionKind::Update,
            Action::Destroy => ActionKind::Destroy,
        }
    }
}

#[derive(Debug, Default)]
struct Ctx {
    flag: bool,
}

type TestStore = ReducerStore<State, Action>;
type Node = NodeRef<RefCell<Ctx>, TestStore>;

fn store() -> Rc<TestStore> {
    Rc::new(ReducerStore::new(|state: Option<State>, action: &Action| {
        let mut state = state.unwrap_or_default();
        match action {
            Action::Initialise(value) => state.init = Some(*value),
            Action::Update(value) => state.value = Some(value.clone()),
            Action::Destroy => state = State::default(),
        }
        state
    }))
}

fn component() -> Node {
    Node::component(ComponentConfig::default())
}

fn context(flag: bool) -> Rc<RefCell<Ctx>> {
    Rc::new(RefCell::new(Ctx { flag }))
}

fn render_counter(node: &Node) -> Rc<Cell<usize>> {
    let count = Rc::new(Cell::new(0));
    let count_clone = count.clone();
    node.add_listener(
        NotificationKind::Render,
        Rc::new(move |_| count_clone.set(count_clone.get() + 1)),
        false,
    );
    count
}

// =============================================================================
// Context resolution
// =============================================================================

#[test]
fn context_resolves_from_nearest_ancestor() {
    let document = Node::document();
    let a = component();
    let b = component();
    let c = component();
    document.append_child(&a).unwrap();
    a.append_child(&b).unwrap();
    b.append_child(&c).unwrap();

    let shared = context(true);
    b.set_context(Some(shared.clone()));

    // C resolves to B, not to A; A has no provider at all.
    let resolved = c.context().unwrap();
    assert!(Rc::ptr_eq(&resolved, &shared));
    assert!(resolved.borrow().flag);
    assert!(a.context().is_none());
}

#[test]
fn context_resolution_skips_plain_containers() {
    let document = Node::document();
    let provider = component();
    let container = Node::container();
    let consumer = component();
    document.append_child(&provider).unwrap();
    provider.append_child(&container).unwrap();
    container.append_child(&consumer).unwrap();

    let shared = context(true);
    provider.set_context(Some(shared.clone()));

    assert!(Rc::ptr_eq(&consumer.context().unwrap(), &shared));
}

#[test]
fn context_crosses_shadow_boundary_to_host() {
    let document = Node::document();
    let host = component();
    document.append_child(&host).unwrap();
    let shared = context(true);
    host.set_context(Some(shared.clone()));

    let shadow = host.attach_shadow().unwrap();
    let inner = component();
    shadow.append_child(&inner).unwrap();

    assert!(Rc::ptr_eq(&inner.context().unwrap(), &shared));
}

#[test]
fn mutating_shared_context_is_visible_tree_wide() {
    let document = Node::document();
    let b = component();
    let c = component();
    document.append_child(&b).unwrap();
    b.append_child(&c).unwrap();

    b.set_context(Some(context(true)));

    // Both nodes share the same object by reference.
    c.context().unwrap().borrow_mut().flag = false;
    assert!(!b.context().unwrap().borrow().flag);
}

#[test]
fn never_attached_node_resolves_nothing() {
    let lone = component();
    assert!(lone.context().is_none());
    assert!(lone.store().is_none());
    assert!(!lone.is_initialised());
}

// =============================================================================
// Invalidation and re-resolution
// =============================================================================

#[test]
fn detach_and_reattach_re_resolves_from_new_position() {
    let document = Node::document();
    let first = component();
    let second = component();
    document.append_child(&first).unwrap();
    document.append_child(&second).unwrap();

    let ctx_first = context(true);
    let ctx_second = context(false);
    first.set_context(Some(ctx_first.clone()));
    second.set_context(Some(ctx_second.clone()));

    let consumer = component();
    first.append_child(&consumer).unwrap();
    assert!(Rc::ptr_eq(&consumer.context().unwrap(), &ctx_first));

    first.remove_child(&consumer).unwrap();
    assert!(consumer.context().is_none());

    second.append_child(&consumer).unwrap();
    assert!(Rc::ptr_eq(&consumer.context().unwrap(), &ctx_second));
}

#[test]
fn moving_a_subtree_re_resolves_through_it() {
    let document = Node::document();
    let first = component();
    let second = component();
    document.append_child(&first).unwrap();
    document.append_child(&second).unwrap();
    first.set_context(Some(context(true)));
    second.set_context(Some(context(false)));

    let container = Node::container();
    let consumer = component();
    first.append_child(&container).unwrap();
    container.append_child(&consumer).unwrap();
    assert!(consumer.context().unwrap().borrow().flag);

    // Re-parenting the container is detach + attach for the whole subtree.
    second.append_child(&container).unwrap();
    assert!(!consumer.context().unwrap().borrow().flag);
}

#[test]
fn detached_provider_stops_notifying_old_descendants() {
    let document = Node::document();
    let provider = component();
    let consumer = component();
    document.append_child(&provider).unwrap();
    provider.append_child(&consumer).unwrap();

    provider.set_context(Some(context(true)));
    assert!(consumer.context().is_some());
    let renders = render_counter(&consumer);

    provider.remove_child(&consumer).unwrap();
    let after_detach = renders.get();

    // The old provider's updates no longer reach the detached consumer.
    provider.set_context(Some(context(false)));
    assert_eq!(renders.get(), after_detach);
}

// =============================================================================
// Own values shadow inheritance
// =============================================================================

#[test]
fn own_context_stops_and_restores_inheritance() {
    let document = Node::document();
    let provider = component();
    let consumer = component();
    document.append_child(&provider).unwrap();
    provider.append_child(&consumer).unwrap();

    let inherited = context(true);
    provider.set_context(Some(inherited.clone()));
    assert!(Rc::ptr_eq(&consumer.context().unwrap(), &inherited));

    let own = context(false);
    consumer.set_context(Some(own.clone()));
    assert!(Rc::ptr_eq(&consumer.context().unwrap(), &own));

    // A node with an explicit value never reacts to ancestor changes.
    let renders = render_counter(&consumer);
    let replacement = context(true);
    provider.set_context(Some(replacement.clone()));
    assert_eq!(renders.get(), 0);
    assert!(Rc::ptr_eq(&consumer.context().unwrap(), &own));

    // Clearing the own value restores inheritance on the next read.
    consumer.set_context(None);
    assert!(Rc::ptr_eq(&consumer.context().unwrap(), &replacement));
}

#[test]
fn middle_provider_takes_over_for_descendants() {
    let document = Node::document();
    let top = component();
    let middle = component();
    let leaf = component();
    document.append_child(&top).unwrap();
    top.append_child(&middle).unwrap();
    middle.append_child(&leaf).unwrap();

    let ctx_top = context(true);
    top.set_context(Some(ctx_top.clone()));
    assert!(Rc::ptr_eq(&leaf.context().unwrap(), &ctx_top));

    // The leaf is subscribed to its immediate provider (the middle node),
    // so the middle node acquiring an own value is exactly the update the
    // subscription delivers.
    let ctx_middle = context(false);
    middle.set_context(Some(ctx_middle.clone()));
    assert!(Rc::ptr_eq(&leaf.context().unwrap(), &ctx_middle));

    // The top provider no longer reaches the leaf.
    top.set_context(Some(context(true)));
    assert!(Rc::ptr_eq(&leaf.context().unwrap(), &ctx_middle));
}

#[test]
fn context_updates_propagate_before_the_setter_returns() {
    let document = Node::document();
    let provider = component();
    let consumer = component();
    document.append_child(&provider).unwrap();
    provider.append_child(&consumer).unwrap();

    provider.set_context(Some(context(true)));
    assert!(consumer.context().is_some());

    let renders = render_counter(&consumer);
    provider.set_context(Some(context(false)));
    // Fully synchronous: the descendant rendered within the setter call.
    assert_eq!(renders.get(), 1);
    assert!(!consumer.context().unwrap().borrow().flag);
}

// =============================================================================
// Render gating and listeners
// =============================================================================

#[test]
fn render_never_fires_before_first_attach() {
    let consumer = component();
    let renders = render_counter(&consumer);

    consumer.set_context(Some(context(true)));
    assert_eq!(renders.get(), 0);

    let document = Node::document();
    document.append_child(&consumer).unwrap();
    consumer.set_context(Some(context(false)));
    assert_eq!(renders.get(), 1);
}

#[test]
fn duplicate_listener_registration_delivers_once() {
    let node = component();
    let count = Rc::new(Cell::new(0));
    let count_clone = count.clone();
    let listener: Listener<RefCell<Ctx>, TestStore> =
        Rc::new(move |_| count_clone.set(count_clone.get() + 1));

    node.add_listener(NotificationKind::Host("ping"), listener.clone(), false);
    node.add_listener(NotificationKind::Host("ping"), listener.clone(), false);

    node.dispatch_host_event("ping");
    assert_eq!(count.get(), 1);

    node.remove_listener(NotificationKind::Host("ping"), &listener, false);
    node.dispatch_host_event("ping");
    assert_eq!(count.get(), 1);
}

#[test]
fn clear_listeners_silences_everything() {
    let document = Node::document();
    let node = component();

    let connected = Rc::new(Cell::new(0));
    let connected_clone = connected.clone();
    node.add_listener(
        NotificationKind::Connected,
        Rc::new(move |_| connected_clone.set(connected_clone.get() + 1)),
        false,
    );
    let renders = render_counter(&node);

    node.clear_listeners(None);
    document.append_child(&node).unwrap();
    node.set_context(Some(context(true)));
    assert_eq!(connected.get(), 0);
    assert_eq!(renders.get(), 0);

    // New listeners work again after the blanket clear.
    let renders = render_counter(&node);
    node.set_context(Some(context(false)));
    assert_eq!(renders.get(), 1);
}

#[test]
fn clear_listeners_can_be_scoped_to_one_kind() {
    let document = Node::document();
    let node = component();

    let connected = Rc::new(Cell::new(0));
    let connected_clone = connected.clone();
    node.add_listener(
        NotificationKind::Connected,
        Rc::new(move |_| connected_clone.set(connected_clone.get() + 1)),
        false,
    );
    let renders = render_counter(&node);

    node.clear_listeners(Some(NotificationKind::Render));
    document.append_child(&node).unwrap();
    node.set_context(Some(context(true)));

    assert_eq!(connected.get(), 1);
    assert_eq!(renders.get(), 0);
}

#[test]
fn initialised_fires_once_and_before_connected() {
    let document = Node::document();
    let container = Node::container();
    let node = component();
    document.append_child(&container).unwrap();

    let order: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));
    let order_init = order.clone();
    node.add_listener(
        NotificationKind::Initialised,
        Rc::new(move |_| order_init.borrow_mut().push("initialised")),
        false,
    );
    let order_conn = order.clone();
    node.add_listener(
        NotificationKind::Connected,
        Rc::new(move |_| order_conn.borrow_mut().push("connected")),
        false,
    );
    let order_disc = order.clone();
    node.add_listener(
        NotificationKind::Disconnected,
        Rc::new(move |_| order_disc.borrow_mut().push("disconnected")),
        false,
    );

    container.append_child(&node).unwrap();
    container.remove_child(&node).unwrap();
    container.append_child(&node).unwrap();

    assert_eq!(
        *order.borrow(),
        vec!["initialised", "connected", "disconnected", "connected"]
    );
    assert!(node.is_initialised());
}

// =============================================================================
// Store connection and filtering
// =============================================================================

#[test]
fn store_is_inherited_and_delivers_state() {
    let document = Node::document();
    let provider = component();
    document.append_child(&provider).unwrap();

    let app_store = store();
    provider.set_store(Some(app_store.clone()));

    let consumer = component();
    provider.append_child(&consumer).unwrap();
    assert!(Rc::ptr_eq(&consumer.store().unwrap(), &app_store));

    let renders = render_counter(&consumer);
    app_store.dispatch(Action::Update("hello".to_string()));

    assert_eq!(renders.get(), 1);
    assert_eq!(
        consumer.state().unwrap().value,
        Some("hello".to_string())
    );

    app_store.dispatch(Action::Destroy);
    assert_eq!(renders.get(), 2);
    assert_eq!(consumer.state(), Some(State::default()));
}

#[test]
fn observed_actions_filter_store_delivery() {
    let document = Node::document();
    let provider = component();
    document.append_child(&provider).unwrap();

    let app_store = store();
    provider.set_store(Some(app_store.clone()));

    let filtered = Node::component(ComponentConfig {
        observed_actions: Some(vec![ActionKind::Update]),
        ..ComponentConfig::default()
    });
    let unfiltered = component();
    provider.append_child(&filtered).unwrap();
    provider.append_child(&unfiltered).unwrap();
    assert_eq!(
        filtered.observed_actions(),
        Some(vec![ActionKind::Update])
    );

    let filtered_renders = render_counter(&filtered);
    let unfiltered_renders = render_counter(&unfiltered);

    app_store.dispatch(Action::Initialise(true));
    assert_eq!(filtered_renders.get(), 0);
    assert_eq!(unfiltered_renders.get(), 1);

    app_store.dispatch(Action::Update("x".to_string()));
    assert_eq!(filtered_renders.get(), 1);
    assert_eq!(unfiltered_renders.get(), 2);
}

#[test]
fn store_disconnect_clears_state_and_renders() {
    let document = Node::document();
    let node = component();
    document.append_child(&node).unwrap();

    let app_store = store();
    node.set_store(Some(app_store.clone()));
    app_store.dispatch(Action::Update("x".to_string()));
    assert!(node.state().is_some());

    let disconnected = Rc::new(Cell::new(0));
    let disconnected_clone = disconnected.clone();
    node.add_listener(
        NotificationKind::StoreDisconnected,
        Rc::new(move |_| disconnected_clone.set(disconnected_clone.get() + 1)),
        false,
    );
    let renders = render_counter(&node);

    node.set_store(None);
    assert_eq!(disconnected.get(), 1);
    assert_eq!(renders.get(), 1);
    assert!(node.state().is_none());
    assert!(node.store().is_none());
    assert_eq!(app_store.subscriber_count(), 0);
}

#[test]
fn detach_releases_the_store_subscription() {
    let document = Node::document();
    let node = component();
    document.append_child(&node).unwrap();

    let app_store = store();
    node.set_store(Some(app_store.clone()));
    assert_eq!(app_store.subscriber_count(), 1);

    app_store.dispatch(Action::Update("x".to_string()));
    assert!(node.state().is_some());

    document.remove_child(&node).unwrap();
    assert_eq!(app_store.subscriber_count(), 0);
    assert!(node.state().is_none());

    // Reattachment reconnects from the node's own store handle.
    document.append_child(&node).unwrap();
    assert_eq!(app_store.subscriber_count(), 1);
}

#[test]
fn render_policy_on_store_connect_renders_without_state() {
    let document = Node::document();
    let node = component();
    document.append_child(&node).unwrap();

    let renders = render_counter(&node);
    node.set_store(Some(store()));
    assert_eq!(renders.get(), 1);
}

#[test]
fn render_policy_after_first_state_waits_for_delivery() {
    let document = Node::document();
    let node = Node::component(ComponentConfig {
        render_policy: RenderPolicy::AfterFirstState,
        ..ComponentConfig::default()
    });
    document.append_child(&node).unwrap();

    let renders = render_counter(&node);
    let app_store = store();
    node.set_store(Some(app_store.clone()));
    assert_eq!(renders.get(), 0);

    app_store.dispatch(Action::Update("x".to_string()));
    assert_eq!(renders.get(), 1);
}

// =============================================================================
// Render payload
// =============================================================================

#[test]
fn render_payload_carries_state_context_and_attributes() {
    let document = Node::document();
    let provider = component();
    document.append_child(&provider).unwrap();
    provider.set_context(Some(context(true)));

    let node = Node::component(ComponentConfig {
        observed_attributes: vec!["label".to_string()],
        ..ComponentConfig::default()
    });
    node.set_attribute("label", "greeting");
    provider.append_child(&node).unwrap();

    let last: Rc<RefCell<Option<(Option<State>, Option<Rc<RefCell<Ctx>>>, Option<String>)>>> =
        Rc::new(RefCell::new(None));
    let last_clone = last.clone();
    node.add_listener(
        NotificationKind::Render,
        Rc::new(move |notification| {
            if let Notification::Render {
                state,
                context,
                attributes,
            } = notification
            {
                *last_clone.borrow_mut() = Some((
                    state.clone(),
                    context.clone(),
                    attributes.get("label").cloned().flatten(),
                ));
            }
        }),
        false,
    );

    let app_store = store();
    node.set_store(Some(app_store.clone()));
    app_store.dispatch(Action::Update("hi".to_string()));

    let (state, ctx, label) = last.borrow().clone().unwrap();
    assert_eq!(state.unwrap().value, Some("hi".to_string()));
    assert!(ctx.unwrap().borrow().flag);
    assert_eq!(label, Some("greeting".to_string()));
}

#[test]
fn attribute_changes_update_snapshot_and_render() {
    let document = Node::document();
    let node = Node::component(ComponentConfig {
        observed_attributes: vec!["size".to_string()],
        ..ComponentConfig::default()
    });
    node.set_attribute("size", "small");
    document.append_child(&node).unwrap();

    // Attach refreshed the snapshot from current attribute values.
    assert_eq!(
        node.monitored_attributes().get("size").cloned().flatten(),
        Some("small".to_string())
    );

    let changes: Rc<RefCell<Vec<(Option<String>, Option<String>)>>> =
        Rc::new(RefCell::new(Vec::new()));
    let changes_clone = changes.clone();
    node.add_listener(
        NotificationKind::AttributeChanged,
        Rc::new(move |notification| {
            if let Notification::AttributeChanged { old, new, .. } = notification {
                changes_clone.borrow_mut().push((old.clone(), new.clone()));
            }
        }),
        false,
    );
    let renders = render_counter(&node);

    node.set_attribute("size", "large");
    node.set_attribute("ignored", "whatever");
    node.remove_attribute("size");

    assert_eq!(
        *changes.borrow(),
        vec![
            (Some("small".to_string()), Some("large".to_string())),
            (Some("large".to_string()), None),
        ]
    );
    assert_eq!(renders.get(), 2);
    assert_eq!(
        node.monitored_attributes().get("size").cloned().flatten(),
        None
    );
}

use crate::context::Context;
use crate::effects::Cleanup;
use crate::element::{
    el, forward_ref, fragment, memo, text, AttrValue, Component, NodeRef, Props, Ref, VNode,
};
use crate::host::{TestEvent, TestHost, TestNode};
use crate::hooks::UseState;
use crate::runtime::Renderer;
use crate::template::{Dynamic, ShapeAttr, ShapeNode, TemplateShape};
use crate::Error;
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

fn setup() -> (Renderer<TestHost>, TestNode) {
    let mut renderer = Renderer::new(TestHost::new());
    let container = renderer.host_mut().create_container();
    (renderer, container)
}

#[test]
fn renders_a_static_tree() {
    let (mut renderer, container) = setup();
    renderer.render(
        el("div")
            .attr("id", "a")
            .child(text("hi"))
            .child(el("span").build())
            .build(),
        &container,
    );
    assert_eq!(
        renderer.host().render_to_string(container),
        r#"root(div[id=a]("hi", span()))"#
    );
}

#[test]
fn updates_text_without_rebuilding_nodes() {
    let (mut renderer, container) = setup();
    renderer.render(el("div").child(text("one")).build(), &container);
    let div = renderer.host().children(container)[0];
    let text_node = renderer.host().children(div)[0];
    let mutations = renderer.host().mutations;

    renderer.render(el("div").child(text("two")).build(), &container);
    assert_eq!(renderer.host().children(container)[0], div);
    assert_eq!(renderer.host().children(div)[0], text_node);
    assert_eq!(renderer.host().text(text_node), Some("two"));
    assert_eq!(renderer.host().mutations, mutations);
}

#[test]
fn patches_attributes_in_place() {
    let (mut renderer, container) = setup();
    renderer.render(el("div").attr("id", "a").attr("data", 1.0).build(), &container);
    let div = renderer.host().children(container)[0];

    renderer.render(el("div").attr("class", "c").attr("id", "b").build(), &container);
    assert_eq!(renderer.host().children(container)[0], div);
    assert_eq!(renderer.host().attr(div, "id"), Some("b"));
    assert_eq!(renderer.host().attr(div, "class"), Some("c"));
    assert_eq!(renderer.host().attr(div, "data"), None);
}

#[test]
fn keyed_children_move_instead_of_rebuilding() {
    fn item(key: &str) -> VNode<TestHost> {
        el("li").key(key).child(text(key)).build()
    }

    let (mut renderer, container) = setup();
    renderer.render(el("ul").children(["a", "b", "c"].map(item)).build(), &container);
    let ul = renderer.host().children(container)[0];
    let original: Vec<TestNode> = renderer.host().children(ul).to_vec();

    renderer.take_stats();
    renderer.render(el("ul").children(["c", "a", "b"].map(item)).build(), &container);
    let reordered: Vec<TestNode> = renderer.host().children(ul).to_vec();
    assert_eq!(reordered, vec![original[2], original[0], original[1]]);
    assert_eq!(
        renderer.host().render_to_string(ul),
        r#"ul(li("c"), li("a"), li("b"))"#
    );

    let stats = renderer.take_stats();
    assert_eq!(stats.created, 0);
    assert_eq!(stats.removed, 0);
    assert!(stats.moved >= 1);
}

#[test]
fn incompatible_descriptor_replaces_at_position() {
    let (mut renderer, container) = setup();
    renderer.render(
        fragment([el("div").build(), el("span").build()]),
        &container,
    );
    let old_first = renderer.host().children(container)[0];
    let old_second = renderer.host().children(container)[1];

    renderer.render(fragment([el("p").build(), el("span").build()]), &container);
    let children = renderer.host().children(container);
    assert_ne!(children[0], old_first);
    assert_eq!(children[1], old_second);
    assert_eq!(renderer.host().tag(children[0]), Some("p"));
}

#[test]
fn empty_descriptor_holds_its_position() {
    let (mut renderer, container) = setup();
    renderer.render(
        fragment([text("a"), VNode::Empty, text("c")]),
        &container,
    );
    let a = renderer.host().children(container)[0];
    let c = renderer.host().children(container)[1];

    renderer.render(
        fragment([text("a"), text("b"), text("c")]),
        &container,
    );
    assert_eq!(
        renderer.host().render_to_string(container),
        r#"root("a", "b", "c")"#
    );
    assert_eq!(renderer.host().children(container)[0], a);
    assert_eq!(renderer.host().children(container)[2], c);
}

#[test]
fn state_updates_rerender_the_component() {
    let (mut renderer, container) = setup();
    let counter: Component<TestHost> = Component::new(|_props, cx| {
        let (count, set_count) = cx.use_state(|| 0);
        el("button")
            .on("inc", move |_| set_count.update(|count| count + 1))
            .child(text(count.to_string()))
            .build()
    });
    renderer.render(counter.with(Props::new()), &container);
    let button = renderer.host().children(container)[0];
    assert_eq!(renderer.host().render_to_string(container), r#"root(button("0"))"#);

    renderer.host().emit(button, "inc", &TestEvent::default());
    renderer.flush();
    assert_eq!(renderer.host().render_to_string(container), r#"root(button("1"))"#);

    // Two updates before the flush coalesce into one render pass.
    renderer.take_stats();
    renderer.host().emit(button, "inc", &TestEvent::default());
    renderer.host().emit(button, "inc", &TestEvent::default());
    renderer.flush();
    assert_eq!(renderer.host().render_to_string(container), r#"root(button("3"))"#);
    assert_eq!(renderer.take_stats().renders, 1);
}

#[test]
fn act_defers_updates_to_the_batch_end() {
    let (mut renderer, container) = setup();
    let stash: Rc<RefCell<Option<UseState<i32>>>> = Rc::default();
    let comp = Component::new({
        let stash = stash.clone();
        move |_props, cx| {
            let (n, set) = cx.use_state(|| 0);
            *stash.borrow_mut() = Some(set);
            text(n.to_string())
        }
    });
    renderer.render(comp.with(Props::new()), &container);

    renderer.act(|renderer| {
        stash.borrow().as_ref().unwrap().set(5);
        // Not flushed until the batch exits.
        assert_eq!(renderer.host().render_to_string(container), r#"root("0")"#);
    });
    assert_eq!(renderer.host().render_to_string(container), r#"root("5")"#);
}

#[test]
fn state_set_during_render_rerenders_before_commit() {
    let (mut renderer, container) = setup();
    let renders = Rc::new(Cell::new(0));
    let comp = Component::new({
        let renders = renders.clone();
        move |_props, cx| {
            renders.set(renders.get() + 1);
            let (n, set) = cx.use_state(|| 0);
            if n < 2 {
                set.set(n + 1);
            }
            text(n.to_string())
        }
    });
    renderer.render(comp.with(Props::new()), &container);
    assert_eq!(renderer.host().render_to_string(container), r#"root("2")"#);
    assert_eq!(renders.get(), 3);
}

#[test]
fn runaway_render_loop_is_capped() {
    let (mut renderer, container) = setup();
    renderer.set_retry_limit(3);
    let comp: Component<TestHost> = Component::new(|_props, cx| {
        let (n, set) = cx.use_state(|| 0);
        set.set(n + 1);
        text(n.to_string())
    });
    renderer.render(comp.with(Props::new()), &container);
    // Three passes ran; the last one's output committed.
    assert_eq!(renderer.host().render_to_string(container), r#"root("2")"#);
    assert_eq!(renderer.take_stats().renders, 3);
}

#[test]
fn deferred_effects_run_cleanup_then_effect() {
    let (mut renderer, container) = setup();
    let events: Rc<RefCell<Vec<String>>> = Rc::default();
    let comp = Component::new({
        let events = events.clone();
        move |_props, cx| {
            let (n, set) = cx.use_state(|| 0);
            {
                let events = events.clone();
                cx.use_effect(n, move || {
                    events.borrow_mut().push(format!("effect {n}"));
                    let events = events.clone();
                    Cleanup::run(move || events.borrow_mut().push(format!("cleanup {n}")))
                });
            }
            el("div")
                .on("bump", move |_| set.update(|n| n + 1))
                .child(text(n.to_string()))
                .build()
        }
    });
    renderer.render(comp.with(Props::new()), &container);
    assert_eq!(*events.borrow(), vec!["effect 0"]);

    let div = renderer.host().children(container)[0];
    renderer.host().emit(div, "bump", &TestEvent::default());
    renderer.flush();
    assert_eq!(*events.borrow(), vec!["effect 0", "cleanup 0", "effect 1"]);

    // Unmount tears the live effect down.
    renderer.render(VNode::Empty, &container);
    assert_eq!(
        *events.borrow(),
        vec!["effect 0", "cleanup 0", "effect 1", "cleanup 1"]
    );
}

#[test]
fn unchanged_deps_skip_the_effect() {
    let (mut renderer, container) = setup();
    let runs = Rc::new(Cell::new(0));
    let comp = Component::new({
        let runs = runs.clone();
        move |_props, cx| {
            let (n, set) = cx.use_state(|| 0);
            {
                let runs = runs.clone();
                cx.use_effect((), move || {
                    runs.set(runs.get() + 1);
                    Cleanup::none()
                });
            }
            el("div")
                .on("bump", move |_| set.update(|n| n + 1))
                .child(text(n.to_string()))
                .build()
        }
    });
    renderer.render(comp.with(Props::new()), &container);
    let div = renderer.host().children(container)[0];
    renderer.host().emit(div, "bump", &TestEvent::default());
    renderer.flush();
    assert_eq!(renderer.host().render_to_string(container), r#"root(div("1"))"#);
    assert_eq!(runs.get(), 1);
}

#[test]
fn layout_effects_flush_as_a_batch() {
    let (mut renderer, container) = setup();
    let events: Rc<RefCell<Vec<String>>> = Rc::default();
    let comp = Component::new({
        let events = events.clone();
        move |_props, cx| {
            let (n, set) = cx.use_state(|| 0);
            {
                let events = events.clone();
                cx.use_layout_effect(n, move || {
                    events.borrow_mut().push(format!("a{n}"));
                    let events = events.clone();
                    Cleanup::run(move || events.borrow_mut().push(format!("ca{n}")))
                });
            }
            {
                let events = events.clone();
                cx.use_layout_effect(n, move || {
                    events.borrow_mut().push(format!("b{n}"));
                    let events = events.clone();
                    Cleanup::run(move || events.borrow_mut().push(format!("cb{n}")))
                });
            }
            el("div")
                .on("bump", move |_| set.update(|n| n + 1))
                .child(text(n.to_string()))
                .build()
        }
    });
    renderer.render(comp.with(Props::new()), &container);
    assert_eq!(*events.borrow(), vec!["a0", "b0"]);

    let div = renderer.host().children(container)[0];
    renderer.host().emit(div, "bump", &TestEvent::default());
    renderer.flush();
    // All cleanups precede all effects within the batch.
    assert_eq!(*events.borrow(), vec!["a0", "b0", "ca0", "cb0", "a1", "b1"]);
}

#[test]
fn memo_skips_rerender_on_shallow_equal_props() {
    let (mut renderer, container) = setup();
    let child_renders = Rc::new(Cell::new(0));
    let child = memo(Component::new({
        let child_renders = child_renders.clone();
        move |props, _cx| {
            child_renders.set(child_renders.get() + 1);
            let label = match props.get("label") {
                Some(AttrValue::Text(label)) => label.clone(),
                _ => Rc::from(""),
            };
            el("span").child(text(label)).build()
        }
    }));
    let stash: Rc<RefCell<Option<UseState<i32>>>> = Rc::default();
    let parent = Component::new({
        let child = child.clone();
        let stash = stash.clone();
        move |_props, cx| {
            let (n, set) = cx.use_state(|| 0);
            *stash.borrow_mut() = Some(set);
            let label = if n < 2 { "x" } else { "y" };
            fragment([
                text(n.to_string()),
                child.with(Props::new().attr("label", label)),
            ])
        }
    });
    renderer.render(parent.with(Props::new()), &container);
    assert_eq!(child_renders.get(), 1);

    renderer.take_stats();
    renderer.act(|_| stash.borrow().as_ref().unwrap().set(1));
    assert_eq!(child_renders.get(), 1);
    assert_eq!(renderer.take_stats().memo_skips, 1);

    // A real prop change renders the child again.
    renderer.act(|_| stash.borrow().as_ref().unwrap().set(2));
    assert_eq!(child_renders.get(), 2);
    assert_eq!(
        renderer.host().render_to_string(container),
        r#"root("2", span("y"))"#
    );
}

#[test]
fn context_reaches_consumers_across_a_memo_barrier() {
    let (mut renderer, container) = setup();
    let theme: Context<i32> = Context::new(0);
    let child_renders = Rc::new(Cell::new(0));
    let consumer_renders = Rc::new(Cell::new(0));

    let child = memo(Component::new({
        let theme = theme.clone();
        let child_renders = child_renders.clone();
        let consumer_renders = consumer_renders.clone();
        move |_props, _cx| {
            child_renders.set(child_renders.get() + 1);
            let consumer_renders = consumer_renders.clone();
            el("div")
                .child(theme.consumer(move |value: &i32| {
                    consumer_renders.set(consumer_renders.get() + 1);
                    text(value.to_string())
                }))
                .build()
        }
    }));
    let stash: Rc<RefCell<Option<UseState<Rc<i32>>>>> = Rc::default();
    let parent = Component::new({
        let theme = theme.clone();
        let child = child.clone();
        let stash = stash.clone();
        move |_props, cx| {
            let (value, set) = cx.use_state(|| Rc::new(0i32));
            *stash.borrow_mut() = Some(set);
            theme.provider(value, vec![child.with(Props::new())])
        }
    });
    renderer.render(parent.with(Props::new()), &container);
    assert_eq!(renderer.host().render_to_string(container), r#"root(div("0"))"#);
    assert_eq!((child_renders.get(), consumer_renders.get()), (1, 1));

    // New value identity: the consumer re-renders, the memo child does not.
    renderer.act(|_| stash.borrow().as_ref().unwrap().set(Rc::new(5)));
    assert_eq!(renderer.host().render_to_string(container), r#"root(div("5"))"#);
    assert_eq!((child_renders.get(), consumer_renders.get()), (1, 2));

    // Equal state is rejected by the setter; nothing re-renders.
    renderer.act(|_| stash.borrow().as_ref().unwrap().set(Rc::new(5)));
    assert_eq!((child_renders.get(), consumer_renders.get()), (1, 2));
}

#[test]
fn reference_equal_provider_value_enqueues_no_consumers() {
    let (mut renderer, container) = setup();
    let theme: Context<i32> = Context::new(0);
    let consumer_renders = Rc::new(Cell::new(0));
    let value = Rc::new(7i32);

    let child = memo(Component::new({
        let theme = theme.clone();
        let consumer_renders = consumer_renders.clone();
        move |_props, _cx| {
            let consumer_renders = consumer_renders.clone();
            el("div")
                .child(theme.consumer(move |value: &i32| {
                    consumer_renders.set(consumer_renders.get() + 1);
                    text(value.to_string())
                }))
                .build()
        }
    }));
    let stash: Rc<RefCell<Option<UseState<i32>>>> = Rc::default();
    let parent = Component::new({
        let theme = theme.clone();
        let child = child.clone();
        let stash = stash.clone();
        let value = value.clone();
        move |_props, cx| {
            let (_, set) = cx.use_state(|| 0);
            *stash.borrow_mut() = Some(set);
            theme.provider(value.clone(), vec![child.with(Props::new())])
        }
    });
    renderer.render(parent.with(Props::new()), &container);
    assert_eq!(renderer.host().render_to_string(container), r#"root(div("7"))"#);
    assert_eq!(consumer_renders.get(), 1);

    // The parent re-renders holding the same value `Rc`. The memo child
    // blocks recursion, so a consumer render here could only come from a
    // provider enqueue, and reference equality must suppress that.
    renderer.take_stats();
    renderer.act(|_| stash.borrow().as_ref().unwrap().set(1));
    assert_eq!(consumer_renders.get(), 1);
    assert_eq!(renderer.take_stats().renders, 1);
}

#[test]
fn panic_during_render_leaves_the_component_schedulable() {
    let (mut renderer, container) = setup();
    let stash: Rc<RefCell<Option<UseState<i32>>>> = Rc::default();
    let comp = Component::new({
        let stash = stash.clone();
        move |_props, cx| {
            let (n, set) = cx.use_state(|| 0);
            *stash.borrow_mut() = Some(set);
            if n == 1 {
                panic!("render failure");
            }
            text(n.to_string())
        }
    });
    renderer.render(comp.with(Props::new()), &container);
    assert_eq!(renderer.host().render_to_string(container), r#"root("0")"#);

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        renderer.act(|_| stash.borrow().as_ref().unwrap().set(1));
    }));
    assert!(result.is_err());

    // The unwind preserved the hook slots and cleared the in-render flag,
    // so a later update renders normally.
    stash.borrow().as_ref().unwrap().set(2);
    renderer.flush();
    assert_eq!(renderer.host().render_to_string(container), r#"root("2")"#);
}

#[test]
fn node_refs_follow_mount_and_unmount() {
    let (mut renderer, container) = setup();
    let node_ref: NodeRef<TestHost> = NodeRef::new();
    renderer.render(el("div").node_ref(&node_ref).build(), &container);
    let div = renderer.host().children(container)[0];
    assert_eq!(node_ref.get(), Some(div));

    renderer.render(VNode::Empty, &container);
    assert_eq!(node_ref.get(), None);
}

#[test]
fn unchanged_ref_identity_is_not_renotified() {
    let (mut renderer, container) = setup();
    let mounts = Rc::new(Cell::new(0));
    let unmounts = Rc::new(Cell::new(0));
    let tracked: Ref<TestHost> = Ref::Callback(Rc::new({
        let mounts = mounts.clone();
        let unmounts = unmounts.clone();
        move |node: Option<&TestNode>| {
            if node.is_some() {
                mounts.set(mounts.get() + 1);
            } else {
                unmounts.set(unmounts.get() + 1);
            }
        }
    }));

    renderer.render(el("div").with_ref(tracked.clone()).build(), &container);
    assert_eq!((mounts.get(), unmounts.get()), (1, 0));

    renderer.render(el("div").with_ref(tracked.clone()).build(), &container);
    assert_eq!((mounts.get(), unmounts.get()), (1, 0));

    renderer.render(VNode::Empty, &container);
    assert_eq!((mounts.get(), unmounts.get()), (1, 1));
}

#[test]
fn templates_rebind_dynamics_in_place() {
    let shape = TemplateShape::new(vec![ShapeNode::Element {
        tag: "div".into(),
        attrs: vec![
            ShapeAttr::Static {
                name: "class".into(),
                value: "card".into(),
            },
            ShapeAttr::Dynamic {
                name: "title".into(),
                slot: 0,
            },
        ],
        children: vec![ShapeNode::Text("header".into()), ShapeNode::Hole(1)],
    }]);
    assert_eq!(shape.slots(), 2);

    let (mut renderer, container) = setup();
    let first = shape
        .instantiate::<TestHost>(vec![Dynamic::Attr("first".into()), Dynamic::Child(text("body"))])
        .unwrap();
    renderer.render(first, &container);
    assert_eq!(
        renderer.host().render_to_string(container),
        r#"root(div[class=card title=first]("header", "body"))"#
    );
    let div = renderer.host().children(container)[0];

    let second = shape
        .instantiate::<TestHost>(vec![
            Dynamic::Attr("second".into()),
            Dynamic::Child(text("body2")),
        ])
        .unwrap();
    renderer.render(second, &container);
    assert_eq!(renderer.host().children(container)[0], div);
    assert_eq!(renderer.host().attr(div, "title"), Some("second"));
    assert_eq!(
        renderer.host().render_to_string(container),
        r#"root(div[class=card title=second]("header", "body2"))"#
    );
}

#[test]
fn template_binding_is_validated() {
    let shape = TemplateShape::new(vec![ShapeNode::Element {
        tag: "div".into(),
        attrs: vec![ShapeAttr::Dynamic {
            name: "title".into(),
            slot: 0,
        }],
        children: vec![ShapeNode::Hole(1)],
    }]);

    let missing = shape.instantiate::<TestHost>(vec![Dynamic::Attr("x".into())]);
    assert!(matches!(
        missing,
        Err(Error::TemplateArity {
            expected: 2,
            got: 1
        })
    ));

    let wrong_kind = shape.instantiate::<TestHost>(vec![
        Dynamic::Child(text("x")),
        Dynamic::Child(text("y")),
    ]);
    assert!(matches!(wrong_kind, Err(Error::TemplateSlot { slot: 0, .. })));
}

#[test]
fn reducer_dispatch_skips_equal_states() {
    #[derive(Clone, Copy)]
    enum Action {
        Inc,
        Nop,
    }

    let (mut renderer, container) = setup();
    let comp = Component::new(move |_props, cx| {
        let (n, dispatch) = cx.use_reducer(
            |state: &i32, action: Action| match action {
                Action::Inc => state + 1,
                Action::Nop => *state,
            },
            || 0,
        );
        let inc = dispatch.clone();
        el("div")
            .on("inc", move |_| inc.call(Action::Inc))
            .on("nop", move |_| dispatch.call(Action::Nop))
            .child(text(n.to_string()))
            .build()
    });
    renderer.render(comp.with(Props::new()), &container);
    let div = renderer.host().children(container)[0];

    renderer.host().emit(div, "inc", &TestEvent::default());
    renderer.flush();
    assert_eq!(renderer.host().render_to_string(container), r#"root(div("1"))"#);

    renderer.take_stats();
    renderer.host().emit(div, "nop", &TestEvent::default());
    renderer.flush();
    assert_eq!(renderer.take_stats().renders, 0);
    assert_eq!(renderer.host().render_to_string(container), r#"root(div("1"))"#);
}

#[test]
fn memoized_values_recompute_only_on_dep_change() {
    let (mut renderer, container) = setup();
    let computes = Rc::new(Cell::new(0));
    let comp = Component::new({
        let computes = computes.clone();
        move |_props, cx| {
            let (n, set_n) = cx.use_state(|| 0);
            let (k, set_k) = cx.use_state(|| 0);
            let tens = {
                let computes = computes.clone();
                cx.use_memo(n, move || {
                    computes.set(computes.get() + 1);
                    n * 10
                })
            };
            el("div")
                .on("n", move |_| set_n.update(|n| n + 1))
                .on("k", move |_| set_k.update(|k| k + 1))
                .child(text(format!("{}:{}", tens, k)))
                .build()
        }
    });
    renderer.render(comp.with(Props::new()), &container);
    let div = renderer.host().children(container)[0];
    assert_eq!(computes.get(), 1);

    // Unrelated state: cached value survives.
    renderer.host().emit(div, "k", &TestEvent::default());
    renderer.flush();
    assert_eq!(computes.get(), 1);
    assert_eq!(renderer.host().render_to_string(container), r#"root(div("0:1"))"#);

    renderer.host().emit(div, "n", &TestEvent::default());
    renderer.flush();
    assert_eq!(computes.get(), 2);
    assert_eq!(renderer.host().render_to_string(container), r#"root(div("10:1"))"#);
}

#[test]
fn forwarded_refs_reach_the_inner_element() {
    let (mut renderer, container) = setup();
    let input = forward_ref::<TestHost>(|_props, node_ref, _cx| {
        let mut builder = el("input");
        if let Some(node_ref) = node_ref {
            builder = builder.with_ref(node_ref.clone());
        }
        builder.build()
    });
    let node_ref: NodeRef<TestHost> = NodeRef::new();
    renderer.render(
        input.with(Ref::Object(node_ref.clone()), Props::new()),
        &container,
    );
    let inner = renderer.host().children(container)[0];
    assert_eq!(renderer.host().tag(inner), Some("input"));
    assert_eq!(node_ref.get(), Some(inner));
}

#[test]
fn wake_fires_once_per_pending_batch() {
    let (mut renderer, container) = setup();
    let wakes = Rc::new(Cell::new(0));
    renderer.set_wake({
        let wakes = wakes.clone();
        move || wakes.set(wakes.get() + 1)
    });
    let counter: Component<TestHost> = Component::new(|_props, cx| {
        let (count, set_count) = cx.use_state(|| 0);
        el("button")
            .on("inc", move |_| set_count.update(|count| count + 1))
            .child(text(count.to_string()))
            .build()
    });
    renderer.render(counter.with(Props::new()), &container);
    assert_eq!(wakes.get(), 0);
    let button = renderer.host().children(container)[0];

    renderer.host().emit(button, "inc", &TestEvent::default());
    renderer.host().emit(button, "inc", &TestEvent::default());
    assert_eq!(wakes.get(), 1);

    renderer.flush();
    renderer.host().emit(button, "inc", &TestEvent::default());
    assert_eq!(wakes.get(), 2);
    renderer.flush();
    assert_eq!(renderer.host().render_to_string(container), r#"root(button("3"))"#);
}

#[test]
fn roots_are_independent() {
    let mut renderer = Renderer::new(TestHost::new());
    let first = renderer.host_mut().create_container();
    let second = renderer.host_mut().create_container();

    renderer.render(text("one"), &first);
    renderer.render(text("two"), &second);
    assert_eq!(renderer.host().render_to_string(first), r#"root("one")"#);
    assert_eq!(renderer.host().render_to_string(second), r#"root("two")"#);

    renderer.render(text("changed"), &first);
    assert_eq!(renderer.host().render_to_string(first), r#"root("changed")"#);
    assert_eq!(renderer.host().render_to_string(second), r#"root("two")"#);

    assert!(renderer.unmount(&first));
    assert_eq!(renderer.host().render_to_string(first), "root()");
    assert_eq!(renderer.host().render_to_string(second), r#"root("two")"#);
    assert!(!renderer.unmount(&first));
}

#[test]
fn only_child_reports_misuse() {
    let props: Props<TestHost> = Props::new().child(text("a"));
    assert!(props.only_child().is_ok());

    let empty: Props<TestHost> = Props::new();
    assert!(matches!(
        empty.only_child(),
        Err(Error::NotExactlyOneChild { found: 0 })
    ));
}

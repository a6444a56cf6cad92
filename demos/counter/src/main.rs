use anyhow::Context;
use sprig_core::*;
use sprig_dom::MemoryDocument;

#[allow(non_snake_case)]
fn Counter(cx: &mut RenderCx<'_>, _props: &Props) -> ViewNode {
    let (count, set_count) = cx.use_value(0i64);

    let step = |delta: i64| {
        let set_count = set_count.clone();
        move |_: &Event| {
            if let Err(err) = set_count.update(|c| c + delta) {
                log::error!("counter update failed: {err}");
            }
        }
    };

    h(
        "div",
        Props::new(),
        children![
            h("p", Props::new(), children!["Current count: ", count]),
            h(
                "button",
                Props::new().class("increment").on("click", step(1)),
                children!["Increment"],
            ),
            h(
                "button",
                Props::new().class("decrement").on("click", step(-1)),
                children!["Decrement"],
            ),
            (count > 5).then(|| h("p", Props::new(), children!["Count is greater than 5!"])),
            (count < 0).then(|| {
                fragment(
                    Props::new(),
                    children![
                        h("p", Props::new(), children!["Count is negative!"]),
                        h("p", Props::new(), children!["Maybe reset?"]),
                    ],
                )
            }),
        ],
    )
}

#[allow(non_snake_case)]
fn App(_cx: &mut RenderCx<'_>, _props: &Props) -> ViewNode {
    fragment(
        Props::new(),
        children![
            h("h2", Props::new(), children!["Counter Example"]),
            component(COUNTER, Props::new(), children![]),
            h("hr", Props::new(), children![]),
            h(
                "p",
                Props::new(),
                children![h(
                    "em",
                    Props::new(),
                    children!["This is a simple counter app to demonstrate the framework."],
                )],
            ),
        ],
    )
}

const COUNTER: Component = Component::new("Counter", Counter);
const APP: Component = Component::new("App", App);

fn press(
    renderer: &Renderer<MemoryDocument>,
    button: HostId,
    times: usize,
) -> anyhow::Result<()> {
    for _ in 0..times {
        renderer.dispatch(button, &Event::new("click"))?;
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut doc = MemoryDocument::new();
    let root = doc.create_root("div");
    let renderer = Renderer::new(doc);

    renderer.render(Some(component(APP, Props::new(), children![])), root)?;
    println!("{}", renderer.with_host(|doc| doc.to_html(root))?);

    let buttons = renderer.with_host(|doc| doc.find_all(root, "button"))?;
    let (increment, decrement) = match buttons.as_slice() {
        [inc, dec, ..] => (*inc, *dec),
        _ => anyhow::bail!("counter buttons were not rendered"),
    };

    press(&renderer, increment, 7)?;
    println!("{}", renderer.with_host(|doc| doc.to_html(root))?);

    press(&renderer, decrement, 9)?;
    println!("{}", renderer.with_host(|doc| doc.to_html(root))?);

    let stats = renderer.stats();
    log::info!(
        "{} passes, {} state renders, {} nodes created, {} removed",
        stats.passes,
        stats.state_renders,
        stats.nodes_created,
        stats.nodes_removed
    );

    renderer.unmount_root(root).context("unmounting the app")?;
    Ok(())
}

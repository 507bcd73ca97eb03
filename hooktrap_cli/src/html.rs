//! Embedded HTML for the live dashboard.

pub const DASHBOARD_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Hooktrap</title>
    <style>
        * { box-sizing: border-box; margin: 0; padding: 0; }
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            background: #fafafa;
            color: #333;
            font-size: 14px;
        }
        header {
            background: #fff;
            border-bottom: 1px solid #e0e0e0;
            padding: 0.75rem 1rem;
            display: flex;
            justify-content: space-between;
            align-items: center;
            position: sticky;
            top: 0;
        }
        h1 { font-size: 1.1rem; font-weight: 600; }
        .status-badge {
            font-size: 0.75rem;
            padding: 0.2rem 0.5rem;
            border-radius: 3px;
            font-weight: 500;
        }
        .status-badge.online { background: #dcfce7; color: #166534; }
        .status-badge.offline { background: #fee2e2; color: #991b1b; }
        main { display: flex; height: calc(100vh - 49px); }
        #list {
            width: 40%;
            overflow-y: auto;
            border-right: 1px solid #e0e0e0;
            background: #fff;
        }
        .item {
            padding: 0.6rem 1rem;
            border-bottom: 1px solid #f0f0f0;
            cursor: pointer;
            display: flex;
            gap: 0.6rem;
            align-items: baseline;
        }
        .item:hover { background: #f5f7ff; }
        .item.selected { background: #eef2ff; }
        .method {
            font-weight: 600;
            font-size: 0.75rem;
            min-width: 3.2rem;
        }
        .method.POST { color: #16a34a; }
        .method.GET { color: #2563eb; }
        .method.PUT, .method.PATCH { color: #d97706; }
        .method.DELETE { color: #dc2626; }
        .path { flex: 1; overflow: hidden; text-overflow: ellipsis; white-space: nowrap; }
        .time { color: #999; font-size: 0.75rem; }
        #detail { flex: 1; overflow-y: auto; padding: 1rem; }
        #detail .empty { color: #999; margin-top: 4rem; text-align: center; }
        h2 { font-size: 0.85rem; text-transform: uppercase; color: #666; margin: 1rem 0 0.4rem; }
        table { border-collapse: collapse; width: 100%; }
        td { padding: 0.25rem 0.5rem; border: 1px solid #eee; vertical-align: top; }
        td:first-child { font-weight: 500; width: 14rem; word-break: break-all; }
        pre {
            background: #f6f8fa;
            border: 1px solid #eee;
            padding: 0.6rem;
            overflow-x: auto;
            white-space: pre-wrap;
            word-break: break-all;
        }
        img.preview { max-width: 320px; max-height: 240px; display: block; margin-top: 0.4rem; }
        button {
            background: #4f46e5;
            color: #fff;
            border: none;
            border-radius: 4px;
            padding: 0.4rem 0.9rem;
            cursor: pointer;
        }
        button:hover { background: #4338ca; }
        #replay-result { margin-top: 0.6rem; color: #166534; }
        #replay-result.error { color: #991b1b; }
    </style>
</head>
<body>
    <header>
        <h1>Hooktrap</h1>
        <span id="status" class="status-badge offline">connecting</span>
    </header>
    <main>
        <div id="list"></div>
        <div id="detail"><p class="empty">Select a request</p></div>
    </main>
    <script>
        let requests = [];
        let selectedId = null;

        function esc(s) {
            return String(s).replace(/[&<>"]/g, c => ({
                '&': '&amp;', '<': '&lt;', '>': '&gt;', '"': '&quot;'
            }[c]));
        }

        function renderList() {
            const list = document.getElementById('list');
            list.innerHTML = requests.map(r => `
                <div class="item ${r.id === selectedId ? 'selected' : ''}" onclick="select('${r.id}')">
                    <span class="method ${esc(r.method)}">${esc(r.method)}</span>
                    <span class="path">${esc(r.url)}</span>
                    <span class="time">${new Date(r.time).toLocaleTimeString()}</span>
                </div>`).join('');
        }

        function select(id) {
            selectedId = id;
            renderList();
            const r = requests.find(x => x.id === id);
            if (!r) return;

            const headers = Object.entries(r.headers || {})
                .map(([k, v]) => `<tr><td>${esc(k)}</td><td>${esc(v)}</td></tr>`).join('');
            const files = (r.files || []).map(f => `
                <tr><td>${esc(f.filename)}</td><td>${esc(f.content_type)} &middot; ${f.size} bytes
                    ${f.data ? `<img class="preview" src="data:${esc(f.content_type)};base64,${f.data}">` : ''}
                </td></tr>`).join('');

            document.getElementById('detail').innerHTML = `
                <button onclick="replay('${r.id}')">Replay</button>
                <div id="replay-result"></div>
                <h2>Request</h2>
                <table>
                    <tr><td>Method</td><td>${esc(r.method)}</td></tr>
                    <tr><td>URL</td><td>${esc(r.url)}</td></tr>
                    <tr><td>Host</td><td>${esc(r.host)}</td></tr>
                    <tr><td>Time</td><td>${esc(r.time)}</td></tr>
                </table>
                <h2>Headers</h2>
                <table>${headers}</table>
                ${files ? `<h2>Files</h2><table>${files}</table>` : ''}
                ${r.body ? `<h2>Body</h2><pre>${esc(r.body)}</pre>` : ''}`;
        }

        async function replay(id) {
            const result = document.getElementById('replay-result');
            result.className = '';
            result.textContent = 'replaying...';
            try {
                const res = await fetch('/api/replay', {
                    method: 'POST',
                    headers: { 'Content-Type': 'application/json' },
                    body: JSON.stringify({ id })
                });
                if (!res.ok) throw new Error(await res.text());
                const data = await res.json();
                result.textContent = `Replayed: ${data.statusText}`;
            } catch (e) {
                result.className = 'error';
                result.textContent = `Replay failed: ${e.message}`;
            }
        }

        async function load() {
            const res = await fetch('/api/requests');
            requests = await res.json();
            renderList();
        }

        function connect() {
            const source = new EventSource('/events');
            const status = document.getElementById('status');
            source.onopen = () => {
                status.textContent = 'live';
                status.className = 'status-badge online';
            };
            source.onerror = () => {
                status.textContent = 'disconnected';
                status.className = 'status-badge offline';
            };
            source.onmessage = (event) => {
                requests.unshift(JSON.parse(event.data));
                renderList();
            };
        }

        load().then(connect);
    </script>
</body>
</html>
"#;
